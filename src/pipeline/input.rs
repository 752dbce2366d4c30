/// How an encoded input is routed, decided once from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Still,
    Animation,
}

const GIF_SIGNATURES: [&[u8; 6]; 2] = [b"GIF87a", b"GIF89a"];

impl InputKind {
    /// sniff treats GIF containers as animations and everything else as a still.
    pub fn sniff(bytes: &[u8]) -> Self {
        if GIF_SIGNATURES.iter().any(|signature| bytes.starts_with(&signature[..])) {
            InputKind::Animation
        } else {
            InputKind::Still
        }
    }
}

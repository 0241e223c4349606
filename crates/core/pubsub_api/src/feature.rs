/// Capabilities a pub/sub component can advertise natively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum Feature {
    /// The component expires messages on its own
    #[strum(serialize = "MESSAGE_TTL")]
    MessageTtl,
}

impl Feature {
    pub fn is_present(self, features: &[Feature]) -> bool {
        features.contains(&self)
    }
}

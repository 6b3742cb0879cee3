use emberlink_ber::LengthForm;
use emberlink_s101::S101Config;

/// Configuration for a [`Consumer`](crate::Consumer).
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Framing limits for both directions.
    pub s101: S101Config,
    /// S101 slot outgoing messages are addressed to. Default: 0.
    pub slot: u8,
    /// Length form of outgoing BER. Default: indefinite.
    pub length_form: LengthForm,
    /// Capacity of the command queue between handles and the connection task. Default: 64.
    pub command_capacity: usize,
    /// Answer S101 keep-alive requests. Default: true.
    pub answer_keep_alive: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            s101: S101Config::default(),
            slot: 0,
            length_form: LengthForm::Indefinite,
            command_capacity: 64,
            answer_keep_alive: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ConsumerConfig::default();
        assert_eq!(config.slot, 0);
        assert_eq!(config.length_form, LengthForm::Indefinite);
        assert_eq!(config.command_capacity, 64);
        assert!(config.answer_keep_alive);
        assert_eq!(config.s101.max_packet_payload, emberlink_s101::DEFAULT_MAX_PACKET_PAYLOAD);
    }
}

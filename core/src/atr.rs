//! The Answer-To-Reset a card returns when powered on.
//!
//! Layout per ISO/IEC 7816-3: `TS T0 {TAi TBi TCi TDi} historical [TCK]`.
//! `T0` and every `TDi` announce in their high nibble which interface
//! octets follow; the low nibble of `T0` counts the historical octets and
//! the low nibble of `TDi` names a protocol `T`.

const CONVENTION_DIRECT: u8 = 0x3B;
const CONVENTION_INVERSE: u8 = 0x3F;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Convention {
    Direct,
    Inverse,
}

/// Answer-To-Reset octets as returned in the power-on data block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct AnswerToReset(Vec<u8>);

/// Positions found while walking the interface octets.
struct Layout {
    protocols: Vec<u8>,
    historical_start: usize,
    historical_len: usize,
}

impl AnswerToReset {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.0.starts_with(prefix)
    }

    /// Reads the convention from the initial character `TS`.
    pub fn convention(&self) -> Option<Convention> {
        match self.0.first() {
            Some(&CONVENTION_DIRECT) => Some(Convention::Direct),
            Some(&CONVENTION_INVERSE) => Some(Convention::Inverse),
            _ => None,
        }
    }

    /// Protocols announced by the card; `T=0` when no `TDi` names one.
    pub fn protocols(&self) -> Option<Vec<u8>> {
        self.layout().map(|layout| layout.protocols)
    }

    /// Historical octets, or `None` if the ATR is shorter than its
    /// structure claims.
    pub fn historical_bytes(&self) -> Option<&[u8]> {
        let layout = self.layout()?;

        self.0
            .get(layout.historical_start..layout.historical_start + layout.historical_len)
    }

    fn layout(&self) -> Option<Layout> {
        let t0 = *self.0.get(1)?;
        let mut cursor = 2;
        let mut indicator = t0 >> 4;
        let mut protocols = Vec::new();

        loop {
            // TAi, TBi, TCi
            cursor += (indicator & 0x07).count_ones() as usize;

            if indicator & 0x08 == 0 {
                break;
            }

            let td = *self.0.get(cursor)?;
            cursor += 1;

            let protocol = td & 0x0F;
            if !protocols.contains(&protocol) {
                protocols.push(protocol);
            }

            indicator = td >> 4;
        }

        if protocols.is_empty() {
            protocols.push(0);
        }

        Some(Layout {
            protocols,
            historical_start: cursor,
            historical_len: (t0 & 0x0F) as usize,
        })
    }
}

impl From<Vec<u8>> for AnswerToReset {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for AnswerToReset {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN_ATR: [u8; 17] = [
        0x3B, 0x8C, 0x80, 0x01, 0x80, 0x73, 0xC0, 0x21, 0xC0, 0x56, 0x53, 0x6F, 0x6C, 0x6F, 0x20,
        0x42, 0xD4,
    ];

    #[test]
    fn test_parse_token_atr() {
        let atr = AnswerToReset::new(TOKEN_ATR.to_vec());

        assert_eq!(Some(Convention::Direct), atr.convention());
        assert!(atr.starts_with(&[0x3B, 0x8C, 0x80, 0x01]));
        assert_eq!(Some(vec![0, 1]), atr.protocols());
        assert_eq!(
            Some(&[0x80, 0x73, 0xC0, 0x21, 0xC0, 0x56, 0x53, 0x6F, 0x6C, 0x6F, 0x20, 0x42][..]),
            atr.historical_bytes(),
        );
    }

    #[test]
    fn test_minimal_atr() {
        // TS, T0 announcing nothing.
        let atr = AnswerToReset::new(vec![0x3F, 0x00]);

        assert_eq!(Some(Convention::Inverse), atr.convention());
        assert_eq!(Some(vec![0]), atr.protocols());
        assert_eq!(Some(&[][..]), atr.historical_bytes());
    }

    #[test]
    fn test_truncated_atr() {
        // Claims 12 historical octets but stops after the first TD.
        let atr = AnswerToReset::new(vec![0x3B, 0x8C, 0x80, 0x01, 0x80]);
        assert_eq!(None, atr.historical_bytes());

        let atr = AnswerToReset::new(vec![0x3B, 0x80]);
        assert_eq!(None, atr.protocols());

        let atr = AnswerToReset::new(vec![]);
        assert_eq!(None, atr.convention());
        assert!(atr.is_empty());
    }
}

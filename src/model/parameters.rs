use crate::EngineError;

/// The three scalar phasing rates, each a probability in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhasingParams {
    /// Carry-forward rate: leftover nucleotide encountered on later flows.
    pub cf: f64,
    /// Incomplete-extension rate: template copies failing to incorporate.
    pub ie: f64,
    /// Droop rate: template copies deactivating per incorporation.
    pub dr: f64,
}

impl PhasingParams {
    /// Validated constructor; every rate must lie in `[0, 1)`.
    pub fn new(cf: f64, ie: f64, dr: f64) -> Result<Self, EngineError> {
        for (name, value) in [("cf", cf), ("ie", ie), ("dr", dr)] {
            if !value.is_finite() || !(0.0..1.0).contains(&value) {
                return Err(EngineError::InvalidRate { name, value });
            }
        }
        Ok(Self { cf, ie, dr })
    }

    /// Carry-forward and incomplete extension only, no droop.
    pub fn without_droop(cf: f64, ie: f64) -> Result<Self, EngineError> {
        Self::new(cf, ie, 0.0)
    }

    /// All rates zero: an ideal instrument with no phasing distortion.
    pub fn ideal() -> Self {
        Self {
            cf: 0.0,
            ie: 0.0,
            dr: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_outside_unit_interval_are_rejected() {
        assert!(PhasingParams::new(0.01, 0.008, 0.0005).is_ok());
        assert!(matches!(
            PhasingParams::new(1.0, 0.0, 0.0),
            Err(EngineError::InvalidRate { name: "cf", .. })
        ));
        assert!(matches!(
            PhasingParams::new(0.0, -0.1, 0.0),
            Err(EngineError::InvalidRate { name: "ie", .. })
        ));
        assert!(PhasingParams::new(0.0, 0.0, f64::NAN).is_err());
    }
}

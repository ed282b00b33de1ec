//! Conversion between physical units and the controller's digital codes.
//!
//! Setpoints are commanded through a DAC and measurements come back through an ADC. The two have
//! independently specified resolutions, so every channel carries both and the two directions never
//! share a factor.

/// Convert a physical value to a DAC code.
///
/// Always rounds towards negative infinity, so the realized output never exceeds the request.
#[inline]
pub fn value_to_code(value: f64, range: f64, dac_resolution: u32) -> i64 {
    (value / (range / dac_resolution as f64)).floor() as i64
}

/// Convert an ADC code to a physical value.
#[inline]
pub fn code_to_value(code: f64, range: f64, adc_resolution: u32) -> f64 {
    code * (range / adc_resolution as f64)
}

/// Scaling parameters for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelScaling {
    /// Physical full-scale value (kV or mA).
    pub range: f64,
    /// Number of distinct DAC codes.
    pub dac_resolution: u32,
    /// Number of distinct ADC codes.
    pub adc_resolution: u32,
}

impl ChannelScaling {
    pub const fn new(range: f64, dac_resolution: u32, adc_resolution: u32) -> Self {
        Self {
            range,
            dac_resolution,
            adc_resolution,
        }
    }

    /// Physical value of one DAC step.
    #[inline]
    pub fn set_factor(&self) -> f64 {
        self.range / self.dac_resolution as f64
    }

    /// Physical value of one ADC step.
    #[inline]
    pub fn get_factor(&self) -> f64 {
        self.range / self.adc_resolution as f64
    }

    /// DAC code for a requested physical value. May lie outside the DAC range.
    #[inline]
    pub fn to_code(&self, value: f64) -> i64 {
        value_to_code(value, self.range, self.dac_resolution)
    }

    /// Whether `code` can be sent to the DAC.
    #[inline]
    pub fn code_in_range(&self, code: i64) -> bool {
        (0..self.dac_resolution as i64).contains(&code)
    }

    /// The physical value actually realized by a DAC code.
    #[inline]
    pub fn quantized(&self, code: i64) -> f64 {
        code as f64 * self.set_factor()
    }

    /// Physical value of a read-back ADC code.
    #[inline]
    pub fn to_value(&self, code: f64) -> f64 {
        code_to_value(code, self.range, self.adc_resolution)
    }
}

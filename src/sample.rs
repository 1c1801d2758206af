use crate::error::{Result, SevereError};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

/// Geographic location a sounding was sampled at.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
}

/// One vertical profile of the atmosphere, lowest level first. The lowest level is the surface.
///
/// Each field is a parallel sequence, so index `i` of every field describes the same level.
/// Pressure is in hPa, height in meters above sea level, temperature and dew point in Celsius,
/// wind speed in knots, and wind direction in degrees (direction the wind blows from).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoundingSample {
    pub location: Location,
    pub pressure: Vec<f64>,
    pub height: Vec<f64>,
    pub temperature: Vec<f64>,
    pub dew_point: Vec<f64>,
    pub wind_speed: Vec<f64>,
    pub wind_direction: Vec<f64>,
}

impl SoundingSample {
    /// The built in mock sounding.
    pub fn mock() -> Self {
        SoundingSample {
            location: Location {
                lat: 35.0,
                lon: -90.0,
            },
            pressure: vec![1000.0, 925.0, 850.0, 700.0, 500.0, 300.0],
            height: vec![0.0, 762.0, 1456.0, 3012.0, 5570.0, 9880.0],
            temperature: vec![25.0, 20.0, 15.0, 0.0, -20.0, -50.0],
            dew_point: vec![20.0, 18.0, 10.0, -5.0, -25.0, -55.0],
            wind_speed: vec![10.0, 15.0, 20.0, 25.0, 30.0, 35.0],
            wind_direction: vec![180.0, 200.0, 220.0, 240.0, 260.0, 280.0],
        }
    }

    /// Load a sample from a JSON file with the same layout as this struct.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let sample: SoundingSample = serde_json::from_reader(reader)?;
        Ok(sample)
    }

    /// Number of levels in the sample, taken from the pressure profile.
    pub fn len(&self) -> usize {
        self.pressure.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pressure.is_empty()
    }

    /// Check the sample describes a usable sounding.
    ///
    /// All profiles must have the same number of levels, there must be at least two levels, every
    /// value must be finite, and pressure must decrease while height increases going up.
    pub fn validate(&self) -> Result<()> {
        let expected = self.len();

        for (profile, vals) in self.profiles() {
            if vals.len() != expected {
                return Err(SevereError::MismatchedLengths {
                    profile,
                    expected,
                    found: vals.len(),
                });
            }

            if vals.iter().any(|v| !v.is_finite()) {
                return Err(SevereError::InvalidSample("non-finite value in profile"));
            }
        }

        if expected < 2 {
            return Err(SevereError::InvalidSample("need at least two levels"));
        }

        if self.pressure.windows(2).any(|w| w[1] >= w[0]) {
            return Err(SevereError::InvalidSample(
                "pressure must decrease with altitude",
            ));
        }

        if self.height.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SevereError::InvalidSample(
                "height must increase with altitude",
            ));
        }

        Ok(())
    }

    fn profiles(&self) -> [(&'static str, &[f64]); 6] {
        [
            ("pressure", self.pressure.as_slice()),
            ("height", self.height.as_slice()),
            ("temperature", self.temperature.as_slice()),
            ("dew point", self.dew_point.as_slice()),
            ("wind speed", self.wind_speed.as_slice()),
            ("wind direction", self.wind_direction.as_slice()),
        ]
    }
}

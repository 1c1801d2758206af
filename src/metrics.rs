use crate::{
    error::Result,
    indexes::supercell_composite,
    profile::{ConvectiveProfile, ProfileMetrics},
    sample::{Location, SoundingSample},
};
use metfor::{JpKg, MetersPSec};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// The derived values exported for one location.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub lat: f64,
    pub lon: f64,
    /// Surface based CAPE, J/kg.
    pub cape: f64,
    /// Supercell composite parameter.
    pub scp: f64,
}

impl MetricRecord {
    /// Pick the exported values out of an analyzed profile.
    ///
    /// CAPE is from the surface based parcel, while SCP uses the most unstable parcel.
    pub fn from_profile<P: ProfileMetrics>(location: Location, profile: &P) -> Self {
        let scp = supercell_composite(
            JpKg(profile.most_unstable_cape()),
            profile.effective_srh(),
            MetersPSec(profile.effective_bwd()),
        );

        MetricRecord {
            lat: location.lat,
            lon: location.lon,
            cape: profile.surface_cape(),
            scp,
        }
    }
}

/// Analyze a sample and compute its metrics. No I/O is done here.
pub fn compute_metrics(sample: &SoundingSample) -> Result<MetricRecord> {
    let profile = ConvectiveProfile::new(sample)?;
    let record = MetricRecord::from_profile(sample.location, &profile);
    debug!(?record, "computed metrics");

    Ok(record)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::SevereError;
    use approx::assert_relative_eq;

    struct FixedProfile {
        mu_cape: f64,
        sb_cape: f64,
        esrh: f64,
        ebwd: f64,
    }

    impl ProfileMetrics for FixedProfile {
        fn most_unstable_cape(&self) -> f64 {
            self.mu_cape
        }

        fn surface_cape(&self) -> f64 {
            self.sb_cape
        }

        fn effective_srh(&self) -> f64 {
            self.esrh
        }

        fn effective_bwd(&self) -> f64 {
            self.ebwd
        }
    }

    #[test]
    fn test_record_from_profile() {
        let profile = FixedProfile {
            mu_cape: 3000.0,
            sb_cape: 2500.0,
            esrh: 150.0,
            ebwd: 25.0,
        };
        let location = Location {
            lat: 35.0,
            lon: -90.0,
        };

        let record = MetricRecord::from_profile(location, &profile);
        assert_relative_eq!(record.lat, 35.0);
        assert_relative_eq!(record.lon, -90.0);
        assert_relative_eq!(record.cape, 2500.0);
        assert_relative_eq!(record.scp, 3.0 * 3.0 * 1.0);
    }

    #[test]
    fn test_compute_metrics_mock() {
        let sample = SoundingSample::mock();
        let record = compute_metrics(&sample).unwrap();

        assert_relative_eq!(record.lat, 35.0);
        assert_relative_eq!(record.lon, -90.0);
        // The surface parcel is still buoyant at 300 hPa.
        assert_relative_eq!(record.cape, 3981.26, max_relative = 0.005);
        assert_relative_eq!(record.scp, 1.681, max_relative = 0.005);

        let again = compute_metrics(&sample).unwrap();
        assert_eq!(record, again);
    }

    #[test]
    fn test_compute_metrics_rejects_short_profile() {
        let mut sample = SoundingSample::mock();
        sample.wind_speed.truncate(4);

        assert!(matches!(
            compute_metrics(&sample),
            Err(SevereError::MismatchedLengths { .. })
        ));
    }

    #[test]
    fn test_record_json_keys() {
        let record = MetricRecord {
            lat: 35.0,
            lon: -90.0,
            cape: 1234.5,
            scp: 0.0,
        };
        let text = serde_json::to_string(&record).unwrap();
        assert_eq!(
            text,
            r#"{"lat":35.0,"lon":-90.0,"cape":1234.5,"scp":0.0}"#
        );
    }
}

//! Assemble a sample into a sounding and run the convective analysis on it.
use crate::{
    error::Result,
    sample::{Location, SoundingSample},
};
use itertools::izip;
use metfor::{
    Celsius, HectoPascal, JpKg, Kelvin, Knots, Meters, MetersPSec, Quantity, WindSpdDir, WindUV,
};
use optional::{some, Noned, Optioned};
use sounding_analysis::{
    bunkers_storm_motion, layer_agl, lift_parcel, mean_wind, most_unstable_parcel, sr_helicity,
    surface_parcel, AnalysisError, Layer, Parcel, ParcelAscentAnalysis, Sounding, StationInfo,
};
use tracing::{debug, trace};

/// Parcels used to find the effective inflow layer need at least this much CAPE (J/kg).
const EFFECTIVE_CAPE: f64 = 100.0;
/// Parcels used to find the effective inflow layer can have no more than this much CIN (J/kg).
const EFFECTIVE_CIN: f64 = -250.0;
/// Deviation of the Bunkers storm motion from the mean wind (m/s).
const BUNKERS_DEVIATION: f64 = 7.5;

/// The only values the metric pipeline reads from an analyzed profile.
pub trait ProfileMetrics {
    /// CAPE of the most unstable parcel, J/kg.
    fn most_unstable_cape(&self) -> f64;
    /// CAPE of the surface based parcel, J/kg.
    fn surface_cape(&self) -> f64;
    /// Storm relative helicity of the effective inflow layer, m²/s².
    fn effective_srh(&self) -> f64;
    /// Bulk wind difference through the lower half of the storm depth, m/s.
    fn effective_bwd(&self) -> f64;
}

/// The parts of a parcel ascent this crate uses.
#[derive(Clone, Copy, Debug)]
struct ParcelSummary {
    cape: Option<f64>,
    cin: f64,
    el_height_asl: Option<Meters>,
}

impl ParcelSummary {
    fn from_analysis(anal: &ParcelAscentAnalysis, snd: &Sounding) -> Self {
        let energy = anal
            .cape()
            .into_option()
            .map(|cape| (cape, anal.cin().into_option().unwrap_or(JpKg(0.0))))
            .or_else(|| buoyancy_to_top(anal, snd));

        let (cape, cin) = match energy {
            Some((cape, cin)) => (Some(cape.unpack()), cin.unpack()),
            None => (None, 0.0),
        };

        ParcelSummary {
            cape,
            cin,
            el_height_asl: anal.el_height_asl().into_option(),
        }
    }

    /// CAPE in J/kg, 0 when the parcel never reaches a level of free convection.
    fn cape(&self) -> f64 {
        self.cape.unwrap_or(0.0)
    }

    /// Does this parcel qualify for the effective inflow layer?
    fn is_effective(&self) -> bool {
        self.cape() >= EFFECTIVE_CAPE && self.cin >= EFFECTIVE_CIN
    }
}

/// A sounding with all the convective parameters this crate reports already analyzed.
#[derive(Clone, Debug)]
pub struct ConvectiveProfile {
    snd: Sounding,
    most_unstable: ParcelSummary,
    surface: ParcelSummary,
    effective_layer: Option<Layer>,
    storm_motion: Option<WindUV<MetersPSec>>,
    esrh: f64,
    ebwd: Option<WindUV<MetersPSec>>,
}

impl ConvectiveProfile {
    /// Validate the sample and analyze it.
    pub fn new(sample: &SoundingSample) -> Result<Self> {
        sample.validate()?;

        let snd = build_sounding(sample);

        let mu_parcel = most_unstable_parcel(&snd)?;
        let most_unstable = ParcelSummary::from_analysis(&lift_parcel(mu_parcel, &snd)?, &snd);
        debug!(
            cape = most_unstable.cape(),
            cin = most_unstable.cin,
            pressure = mu_parcel.pressure.unpack(),
            "most unstable parcel"
        );

        let sfc_parcel = surface_parcel(&snd)?;
        let surface = ParcelSummary::from_analysis(&lift_parcel(sfc_parcel, &snd)?, &snd);
        debug!(cape = surface.cape(), cin = surface.cin, "surface parcel");

        let effective_layer = effective_inflow_layer(&snd);
        debug!(
            bottom = ?effective_layer.map(|lyr| lyr.bottom.pressure),
            top = ?effective_layer.map(|lyr| lyr.top.pressure),
            "effective inflow layer"
        );

        let storm_motion = match right_mover(&snd) {
            Ok(storm) => Some(storm),
            Err(err) => {
                debug!(%err, "no storm motion");
                None
            }
        };
        debug!(?storm_motion, "right moving storm motion");

        let esrh = match (&effective_layer, storm_motion) {
            (Some(layer), Some(storm)) => sr_helicity(layer, storm, &snd)
                .map(|srh| srh.unpack())
                .unwrap_or(0.0),
            _ => 0.0,
        };

        let el_height_agl = equilibrium_level_agl(&most_unstable, &snd);
        let ebwd = match (&effective_layer, el_height_agl) {
            (Some(layer), Some(el_agl)) => effective_bulk_wind_difference(&snd, layer, el_agl).ok(),
            _ => None,
        };
        debug!(esrh, ebwd = ?ebwd.map(speed), "effective layer kinematics");

        Ok(ConvectiveProfile {
            snd,
            most_unstable,
            surface,
            effective_layer,
            storm_motion,
            esrh,
            ebwd,
        })
    }

    /// The sounding the analysis ran on. The first row is the surface.
    pub fn sounding(&self) -> &Sounding {
        &self.snd
    }

    pub fn effective_layer(&self) -> Option<&Layer> {
        self.effective_layer.as_ref()
    }

    /// Bunkers right mover.
    pub fn storm_motion(&self) -> Option<WindUV<MetersPSec>> {
        self.storm_motion
    }

    /// Effective bulk wind difference as a vector.
    pub fn effective_shear(&self) -> Option<WindUV<MetersPSec>> {
        self.ebwd
    }
}

impl ProfileMetrics for ConvectiveProfile {
    fn most_unstable_cape(&self) -> f64 {
        self.most_unstable.cape()
    }

    fn surface_cape(&self) -> f64 {
        self.surface.cape()
    }

    fn effective_srh(&self) -> f64 {
        self.esrh
    }

    fn effective_bwd(&self) -> f64 {
        self.ebwd.map(speed).unwrap_or(0.0)
    }
}

fn to_profile<T, F>(vals: &[f64], wrap: F) -> Vec<Optioned<T>>
where
    T: Noned + Copy,
    F: Fn(f64) -> T,
{
    vals.iter().map(|&val| some(wrap(val))).collect()
}

fn wind(speed: f64, direction: f64) -> WindSpdDir<Knots> {
    WindSpdDir {
        speed: Knots(speed),
        direction,
    }
}

/// Build the sounding from a validated sample.
///
/// The lowest level of the sample is the surface, so it becomes the station values and the
/// profiles hold the levels above it.
fn build_sounding(sample: &SoundingSample) -> Sounding {
    let Location { lat, lon } = sample.location;
    let station = StationInfo::new()
        .with_lat_lon((lat, lon))
        .with_elevation(Meters(sample.height[0]));

    let winds = izip!(&sample.wind_speed[1..], &sample.wind_direction[1..])
        .map(|(&spd, &dir)| some(wind(spd, dir)))
        .collect();

    Sounding::new()
        .with_station_info(station)
        .with_pressure_profile(to_profile(&sample.pressure[1..], HectoPascal))
        .with_height_profile(to_profile(&sample.height[1..], Meters))
        .with_temperature_profile(to_profile(&sample.temperature[1..], Celsius))
        .with_dew_point_profile(to_profile(&sample.dew_point[1..], Celsius))
        .with_wind_profile(winds)
        .with_station_pressure(HectoPascal(sample.pressure[0]))
        .with_sfc_temperature(Celsius(sample.temperature[0]))
        .with_sfc_dew_point(Celsius(sample.dew_point[0]))
        .with_sfc_wind(wind(sample.wind_speed[0], sample.wind_direction[0]))
}

/// CAPE and CIN of a parcel with a level of free convection but no equilibrium level.
///
/// The parcel is still buoyant at the top of the sounding, so the positive area is integrated
/// all the way up. The integration matches the one `lift_parcel` does below the equilibrium
/// level.
fn buoyancy_to_top(anal: &ParcelAscentAnalysis, snd: &Sounding) -> Option<(JpKg, JpKg)> {
    let lfc = anal.lfc_pressure().into_option()?;
    let profile = anal.profile();

    let levels = izip!(
        &profile.pressure,
        &profile.height,
        &profile.parcel_t,
        &profile.environment_t
    )
    .map(|(&p, &h, &pt, &et)| (p, h, pt, et))
    .chain(top_of_sounding(anal, snd));

    let (cape, cin, ..) = levels.fold(
        (0.0, 0.0, Meters(std::f64::MAX), Kelvin(0.0), Kelvin(0.0)),
        |(mut cape, mut cin, prev_h, prev_pt, prev_et), (p, h, pt, et)| {
            let (pt, et) = (Kelvin::from(pt), Kelvin::from(et));

            let dz = h - prev_h;
            if dz > Meters(0.0) {
                let buoyancy = ((pt - et).unpack() / et.unpack()
                    + (prev_pt - prev_et).unpack() / prev_et.unpack())
                    * dz.unpack();

                if buoyancy > 0.0 && p <= lfc {
                    cape += buoyancy;
                } else if buoyancy < 0.0 {
                    cin += buoyancy;
                }
            }

            (cape, cin, h, pt, et)
        },
    );

    Some((JpKg(cape / 2.0 * -metfor::g), JpKg(cin / 2.0 * -metfor::g)))
}

/// The top level of the sounding as a parcel profile level (pressure, height, parcel and
/// environment virtual temperatures).
///
/// `lift_parcel` stops its profile one level below the top of the sounding.
fn top_of_sounding(
    anal: &ParcelAscentAnalysis,
    snd: &Sounding,
) -> Option<(HectoPascal, Meters, Celsius, Celsius)> {
    let last_p = *anal.profile().pressure.last()?;

    let (p, h, t, dp) = snd.top_down().find_map(|row| {
        Some((
            row.pressure.into_option()?,
            row.height.into_option()?,
            row.temperature.into_option()?,
            row.dew_point.into_option()?,
        ))
    })?;

    if p >= last_p {
        return None;
    }

    let pcl = anal.parcel();
    let pcl_vt = if p > anal.lcl_pressure().into_option()? {
        let pcl_t = metfor::temperature_from_theta(pcl.theta(), p);
        let pcl_dp = metfor::dew_point_from_p_and_mw(p, pcl.mixing_ratio().ok()?)?;
        metfor::virtual_temperature(pcl_t, pcl_dp, p)?
    } else {
        let theta_e = pcl.theta_e().ok()?;
        let pcl_t = metfor::temperature_from_theta_e_saturated_and_pressure(p, theta_e)?;
        metfor::virtual_temperature(pcl_t, pcl_t, p)?
    };
    let env_vt = metfor::virtual_temperature(t, dp, p)?;

    Some((p, h, Celsius::from(pcl_vt), Celsius::from(env_vt)))
}

/// Find the effective inflow layer by lifting a parcel from every level.
///
/// The bottom is the first level from the surface up with at least 100 J/kg of CAPE and no more
/// than 250 J/kg of CIN, the top is the last level of the run of qualifying levels that starts
/// there. Levels whose parcel has no CAPE at all are skipped. Parcels still rising at the top of
/// the sounding count with the CAPE they have up to there.
fn effective_inflow_layer(snd: &Sounding) -> Option<Layer> {
    let mut rows = snd
        .bottom_up()
        .filter_map(|row| Parcel::from_datarow(row).map(|pcl| (row, pcl)))
        .filter_map(|(row, pcl)| {
            let anal = lift_parcel(pcl, snd).ok()?;
            let summary = ParcelSummary::from_analysis(&anal, snd);
            trace!(
                pressure = pcl.pressure.unpack(),
                cape = ?summary.cape,
                cin = summary.cin,
                "effective layer search"
            );

            summary.cape.map(|_| (row, summary.is_effective()))
        })
        .skip_while(|&(_, effective)| !effective)
        .take_while(|&(_, effective)| effective)
        .map(|(row, _)| row);

    let bottom = rows.next()?;
    let top = rows.last()?;

    Some(Layer { bottom, top })
}

/// Bunkers right moving storm motion.
///
/// Soundings without levels inside the lowest and highest half kilometer of the 0-6 km layer
/// can't give the half kilometer mean winds, so the deviation falls back to the 0-6 km bulk
/// shear.
fn right_mover(snd: &Sounding) -> sounding_analysis::Result<WindUV<MetersPSec>> {
    match bunkers_storm_motion(snd) {
        Ok((right, _left)) => Ok(right),
        Err(err) => {
            trace!(%err, "bunkers storm motion, using the 0-6 km shear");

            let layer = layer_agl(snd, Meters(6000.0))?;
            let mean = mean_wind(&layer, snd)?;
            let shear = layer.wind_shear().ok_or(AnalysisError::MissingValue)?;

            Ok(deviate_right(mean, shear))
        }
    }
}

fn deviate_right(mean: WindUV<MetersPSec>, shear: WindUV<MetersPSec>) -> WindUV<MetersPSec> {
    let shear_speed = speed(shear);
    if shear_speed == 0.0 {
        return mean;
    }

    let scale = BUNKERS_DEVIATION / shear_speed;
    WindUV {
        u: mean.u + shear.v * scale,
        v: mean.v - shear.u * scale,
    }
}

fn speed(wind: WindUV<MetersPSec>) -> f64 {
    wind.u.unpack().hypot(wind.v.unpack())
}

/// Height of the equilibrium level above ground.
///
/// A buoyant parcel with no equilibrium level is still rising at the top of the sounding, so the
/// top of the sounding is used instead.
fn equilibrium_level_agl(parcel: &ParcelSummary, snd: &Sounding) -> Option<Meters> {
    let elevation = snd.station_info().elevation().into_option()?;

    match parcel.el_height_asl {
        Some(el) => Some(el - elevation),
        None if parcel.cape() > 0.0 => snd
            .height_profile()
            .iter()
            .rev()
            .find_map(|hgt| hgt.into_option())
            .map(|top| top - elevation),
        None => None,
    }
}

/// Shear from the bottom of the effective inflow layer to half way between there and the
/// equilibrium level of the most unstable parcel.
fn effective_bulk_wind_difference(
    snd: &Sounding,
    layer: &Layer,
    el_height_agl: Meters,
) -> sounding_analysis::Result<WindUV<MetersPSec>> {
    let elevation = snd
        .station_info()
        .elevation()
        .into_option()
        .ok_or(AnalysisError::MissingValue)?;
    let base = layer
        .bottom
        .height
        .into_option()
        .ok_or(AnalysisError::MissingValue)?
        - elevation;

    let depth = Meters((el_height_agl - base).unpack() / 2.0);
    if depth <= Meters(0.0) {
        return Err(AnalysisError::InvalidInput);
    }

    let top = layer_agl(snd, base + depth)?.top;
    Layer {
        bottom: layer.bottom,
        top,
    }
    .wind_shear()
    .ok_or(AnalysisError::MissingValue)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn summary(cape: Option<f64>, cin: f64, el_height_asl: Option<f64>) -> ParcelSummary {
        ParcelSummary {
            cape,
            cin,
            el_height_asl: el_height_asl.map(Meters),
        }
    }

    fn mock_sounding() -> Sounding {
        build_sounding(&SoundingSample::mock())
    }

    #[test]
    fn test_effective_parcel_criteria() {
        assert!(summary(Some(100.0), 0.0, None).is_effective());
        assert!(summary(Some(2500.0), -250.0, None).is_effective());
        assert!(!summary(Some(99.9), 0.0, None).is_effective());
        assert!(!summary(Some(2500.0), -250.1, None).is_effective());
        assert!(!summary(None, 0.0, None).is_effective());
    }

    #[test]
    fn test_build_sounding_surface_row() {
        let snd = mock_sounding();

        assert_eq!(snd.pressure_profile().len(), 6);
        assert_eq!(snd.wind_profile().len(), 6);
        assert_eq!(snd.station_info().elevation(), some(Meters(0.0)));
        assert_eq!(snd.station_info().location(), Some((35.0, -90.0)));

        let sfc = snd.data_row(0).unwrap();
        assert_eq!(sfc.pressure, some(HectoPascal(1000.0)));
        assert_eq!(sfc.temperature, some(Celsius(25.0)));
        assert_eq!(sfc.dew_point, some(Celsius(20.0)));
        assert_eq!(sfc.height, some(Meters(0.0)));
        assert!(sfc.wind.is_some());

        let top = snd.data_row(5).unwrap();
        assert_eq!(top.pressure, some(HectoPascal(300.0)));
        assert_eq!(top.height, some(Meters(9880.0)));
    }

    #[test]
    fn test_parcel_still_rising_at_top_has_cape() {
        let snd = mock_sounding();
        let pcl = Parcel {
            temperature: Celsius(25.0),
            pressure: HectoPascal(1000.0),
            dew_point: Celsius(20.0),
        };
        let anal = lift_parcel(pcl, &snd).unwrap();

        // Free convection without an equilibrium level.
        assert!(anal.lfc_pressure().is_some());
        assert!(anal.el_pressure().is_none());
        assert!(anal.cape().is_none());

        let parcel = ParcelSummary::from_analysis(&anal, &snd);
        assert!(parcel.cape() > 1000.0);
        assert_relative_eq!(parcel.cape(), 3981.26, max_relative = 0.005);
        assert_relative_eq!(parcel.cin, -26.79, max_relative = 0.01);
        assert!(parcel.el_height_asl.is_none());
    }

    #[test]
    fn test_parcel_without_lfc_has_no_cape() {
        let snd = mock_sounding();
        let pcl = Parcel {
            temperature: Celsius(0.0),
            pressure: HectoPascal(700.0),
            dew_point: Celsius(-20.0),
        };
        let anal = lift_parcel(pcl, &snd).unwrap();
        assert!(anal.lfc_pressure().is_none());

        let parcel = ParcelSummary::from_analysis(&anal, &snd);
        assert!(parcel.cape.is_none());
        assert_eq!(parcel.cape(), 0.0);
    }

    #[test]
    fn test_equilibrium_level_agl() {
        let snd = mock_sounding();

        let el = equilibrium_level_agl(&summary(Some(1000.0), 0.0, Some(8500.0)), &snd);
        assert_eq!(el, Some(Meters(8500.0)));

        // Still rising at the top of the sounding.
        let el = equilibrium_level_agl(&summary(Some(1000.0), 0.0, None), &snd);
        assert_eq!(el, Some(Meters(9880.0)));

        let el = equilibrium_level_agl(&summary(None, 0.0, None), &snd);
        assert_eq!(el, None);
    }

    #[test]
    fn test_deviate_right() {
        let mean = WindUV {
            u: MetersPSec(10.0),
            v: MetersPSec(0.0),
        };
        let northward = WindUV {
            u: MetersPSec(0.0),
            v: MetersPSec(20.0),
        };

        let storm = deviate_right(mean, northward);
        assert_relative_eq!(storm.u.unpack(), 17.5);
        assert_relative_eq!(storm.v.unpack(), 0.0);

        let calm = WindUV {
            u: MetersPSec(0.0),
            v: MetersPSec(0.0),
        };
        let storm = deviate_right(mean, calm);
        assert_relative_eq!(storm.u.unpack(), 10.0);
    }

    #[test]
    fn test_effective_bulk_wind_difference() {
        let snd = mock_sounding();
        let layer = Layer {
            bottom: snd.data_row(0).unwrap(),
            top: snd.data_row(2).unwrap(),
        };

        // Half of a 6024 m deep storm reaches the 700 hPa level, 25 kt from 240 degrees. The
        // surface wind is 10 kt from the south.
        let shear = effective_bulk_wind_difference(&snd, &layer, Meters(6024.0)).unwrap();
        let kt = 1.943_844_494;
        let expected_u = -25.0 * 240.0_f64.to_radians().sin() / kt;
        let expected_v = (-25.0 * 240.0_f64.to_radians().cos() - 10.0) / kt;
        assert_relative_eq!(shear.u.unpack(), expected_u, epsilon = 1.0e-6);
        assert_relative_eq!(shear.v.unpack(), expected_v, epsilon = 1.0e-6);

        assert!(effective_bulk_wind_difference(&snd, &layer, Meters(0.0)).is_err());
    }

    #[test]
    fn test_mock_profile() {
        let profile = ConvectiveProfile::new(&SoundingSample::mock()).unwrap();

        let layer = profile
            .effective_layer()
            .expect("the mock sounding has an effective inflow layer");
        assert_eq!(layer.bottom.pressure, some(HectoPascal(1000.0)));
        assert_eq!(layer.top.pressure, some(HectoPascal(850.0)));

        assert_relative_eq!(profile.surface_cape(), 3981.26, max_relative = 0.005);
        assert_relative_eq!(profile.most_unstable_cape(), 4022.87, max_relative = 0.005);

        // Too coarse for the half kilometer means, so this is the 0-6 km shear deviation.
        let storm = profile.storm_motion().unwrap();
        assert_relative_eq!(storm.u.unpack(), 7.834, max_relative = 0.005);
        assert_relative_eq!(storm.v.unpack(), -1.477, max_relative = 0.005);

        assert_relative_eq!(profile.effective_srh(), 29.26, max_relative = 0.005);
        assert_relative_eq!(profile.effective_bwd(), 14.28, max_relative = 0.005);
    }

    #[test]
    fn test_mismatched_sample_is_rejected() {
        let mut sample = SoundingSample::mock();
        sample.temperature.pop();
        assert!(ConvectiveProfile::new(&sample).is_err());
    }
}

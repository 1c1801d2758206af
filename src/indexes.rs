use metfor::{JpKg, MetersPSec, Quantity};

/// Supercell composite parameter.
///
/// Combines most unstable CAPE, effective storm relative helicity (m²/s²), and the effective bulk
/// wind difference. The shear term is zero below 10 m/s and is capped at 20 m/s.
pub fn supercell_composite(mu_cape: JpKg, esrh: f64, ebwd: MetersPSec) -> f64 {
    let ebwd = ebwd.unpack();
    let ebwd = if ebwd > 20.0 {
        20.0
    } else if ebwd < 10.0 {
        0.0
    } else {
        ebwd
    };

    let cape_term = mu_cape.unpack() / 1000.0;
    let srh_term = esrh / 50.0;
    let shear_term = ebwd / 20.0;

    cape_term * srh_term * shear_term
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scp_typical() {
        let scp = supercell_composite(JpKg(2000.0), 200.0, MetersPSec(15.0));
        assert_relative_eq!(scp, 2.0 * 4.0 * 0.75);
    }

    #[test]
    fn test_scp_shear_limits() {
        let weak = supercell_composite(JpKg(3000.0), 300.0, MetersPSec(9.9));
        assert_relative_eq!(weak, 0.0);

        let at_cap = supercell_composite(JpKg(1000.0), 50.0, MetersPSec(20.0));
        let above_cap = supercell_composite(JpKg(1000.0), 50.0, MetersPSec(35.0));
        assert_relative_eq!(at_cap, 1.0);
        assert_relative_eq!(above_cap, 1.0);

        let at_floor = supercell_composite(JpKg(1000.0), 50.0, MetersPSec(10.0));
        assert_relative_eq!(at_floor, 0.5);
    }

    #[test]
    fn test_scp_sign_follows_helicity() {
        let scp = supercell_composite(JpKg(1500.0), -100.0, MetersPSec(25.0));
        assert_relative_eq!(scp, -3.0);

        assert_relative_eq!(
            supercell_composite(JpKg(0.0), 400.0, MetersPSec(25.0)),
            0.0
        );
    }
}

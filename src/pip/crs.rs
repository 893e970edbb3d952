//! Coordinate reference systems accepted for boundary layers.
//!
//! Everything is normalized to geographic WGS84 (lon, lat) at load time.
//! GDA94 and GDA2020 geographic coordinates are used as-is: the datum
//! offset from WGS84 is under two metres, well below the precision of
//! the boundary data.

use geo::Coord;

/// GRS80 semi-major axis (metres)
const GRS80_A: f64 = 6_378_137.0;
/// GRS80 inverse flattening
const GRS80_INV_F: f64 = 298.257_222_101;

/// Supported source CRS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    /// WGS84, GDA94 or GDA2020 lat/lon
    Geographic { epsg: u32 },
    /// Australian Albers Equal Area (GDA94 or GDA2020)
    AustralianAlbers { epsg: u32 },
    /// Spherical Web Mercator
    WebMercator,
    /// Map Grid of Australia (UTM, southern hemisphere)
    Mga { epsg: u32, zone: u8 },
}

pub const WGS84: Crs = Crs::Geographic { epsg: 4326 };

impl Crs {
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 | 4283 | 7844 => Some(Crs::Geographic { epsg: code }),
            3577 | 9473 => Some(Crs::AustralianAlbers { epsg: code }),
            3857 | 900913 => Some(Crs::WebMercator),
            28348..=28358 => Some(Crs::Mga {
                epsg: code,
                zone: (code - 28300) as u8,
            }),
            7848..=7858 => Some(Crs::Mga {
                epsg: code,
                zone: (code - 7800) as u8,
            }),
            _ => None,
        }
    }

    /// Extract an EPSG code from a CRS identifier.
    ///
    /// Accepts `EPSG:4326`, `urn:ogc:def:crs:EPSG::4326`,
    /// `http://www.opengis.net/def/crs/EPSG/0/4326` and `OGC CRS84`.
    pub fn parse_epsg(name: &str) -> Option<u32> {
        let upper = name.trim().to_ascii_uppercase();
        if upper.ends_with("CRS84") {
            return Some(4326);
        }
        if !upper.contains("EPSG") {
            return None;
        }
        upper
            .rsplit(|c: char| !c.is_ascii_digit())
            .next()
            .filter(|digits| !digits.is_empty())
            .and_then(|digits| digits.parse().ok())
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Geographic { epsg } | Crs::AustralianAlbers { epsg } | Crs::Mga { epsg, .. } => {
                *epsg
            }
            Crs::WebMercator => 3857,
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Geographic { .. })
    }

    /// Build the transform into WGS84 lon/lat
    pub fn to_wgs84(&self) -> Reprojection {
        match self {
            Crs::Geographic { .. } => Reprojection::Identity,
            Crs::AustralianAlbers { .. } => Reprojection::Albers(Albers::australian()),
            Crs::WebMercator => Reprojection::WebMercator,
            Crs::Mga { zone, .. } => Reprojection::Utm(Utm::south(*zone)),
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

fn grs80_e2() -> f64 {
    let f = 1.0 / GRS80_INV_F;
    f * (2.0 - f)
}

/// Inverse projection into WGS84 degrees
#[derive(Debug, Clone, Copy)]
pub enum Reprojection {
    Identity,
    Albers(Albers),
    WebMercator,
    Utm(Utm),
}

impl Reprojection {
    pub fn is_identity(&self) -> bool {
        matches!(self, Reprojection::Identity)
    }

    pub fn apply(&self, c: Coord<f64>) -> Coord<f64> {
        match self {
            Reprojection::Identity => c,
            Reprojection::Albers(p) => p.inverse(c),
            Reprojection::WebMercator => {
                let lon = (c.x / GRS80_A).to_degrees();
                let lat = (2.0 * (c.y / GRS80_A).exp().atan() - std::f64::consts::FRAC_PI_2)
                    .to_degrees();
                Coord { x: lon, y: lat }
            }
            Reprojection::Utm(p) => p.inverse(c),
        }
    }
}

/// Ellipsoidal Albers Equal Area Conic (Snyder 1987, ch. 14)
#[derive(Debug, Clone, Copy)]
pub struct Albers {
    e: f64,
    e2: f64,
    lon0: f64,
    n: f64,
    c: f64,
    rho0: f64,
}

impl Albers {
    /// EPSG:3577 / EPSG:9473 parameters
    pub fn australian() -> Self {
        Self::new(-18.0, -36.0, 0.0, 132.0)
    }

    fn new(lat1: f64, lat2: f64, lat0: f64, lon0: f64) -> Self {
        let e2 = grs80_e2();
        let e = e2.sqrt();
        let m = |phi: f64| phi.cos() / (1.0 - e2 * phi.sin().powi(2)).sqrt();
        let (phi1, phi2, phi0) = (lat1.to_radians(), lat2.to_radians(), lat0.to_radians());

        let (m1, m2) = (m(phi1), m(phi2));
        let (q1, q2, q0) = (
            albers_q(phi1.sin(), e),
            albers_q(phi2.sin(), e),
            albers_q(phi0.sin(), e),
        );

        let n = (m1 * m1 - m2 * m2) / (q2 - q1);
        let c = m1 * m1 + n * q1;
        let rho0 = GRS80_A * (c - n * q0).sqrt() / n;

        Self {
            e,
            e2,
            lon0: lon0.to_radians(),
            n,
            c,
            rho0,
        }
    }

    pub fn inverse(&self, p: Coord<f64>) -> Coord<f64> {
        let dy = self.rho0 - p.y;
        let rho = (p.x * p.x + dy * dy).sqrt();
        let theta = if self.n < 0.0 {
            (-p.x).atan2(-dy)
        } else {
            p.x.atan2(dy)
        };
        let q = (self.c - (rho * self.n / GRS80_A).powi(2)) / self.n;

        let mut phi = (q / 2.0).clamp(-1.0, 1.0).asin();
        for _ in 0..20 {
            let sin = phi.sin();
            let es = self.e * sin;
            let one = 1.0 - es * es;
            let delta = one * one / (2.0 * phi.cos())
                * (q / (1.0 - self.e2) - sin / one
                    + (1.0 / (2.0 * self.e)) * ((1.0 - es) / (1.0 + es)).ln());
            phi += delta;
            if delta.abs() < 1e-12 {
                break;
            }
        }

        Coord {
            x: (self.lon0 + theta / self.n).to_degrees(),
            y: phi.to_degrees(),
        }
    }

    #[cfg(test)]
    pub(crate) fn forward(&self, lonlat: Coord<f64>) -> Coord<f64> {
        let phi = lonlat.y.to_radians();
        let q = albers_q(phi.sin(), self.e);
        let rho = GRS80_A * (self.c - self.n * q).sqrt() / self.n;
        let theta = self.n * (lonlat.x.to_radians() - self.lon0);
        Coord {
            x: rho * theta.sin(),
            y: self.rho0 - rho * theta.cos(),
        }
    }
}

fn albers_q(sin_phi: f64, e: f64) -> f64 {
    let es = e * sin_phi;
    (1.0 - e * e)
        * (sin_phi / (1.0 - es * es) - (1.0 / (2.0 * e)) * ((1.0 - es) / (1.0 + es)).ln())
}

/// Southern-hemisphere Transverse Mercator inverse (Snyder 1987, ch. 8)
#[derive(Debug, Clone, Copy)]
pub struct Utm {
    lon0: f64,
}

impl Utm {
    const K0: f64 = 0.9996;
    const FALSE_EASTING: f64 = 500_000.0;
    const FALSE_NORTHING: f64 = 10_000_000.0;

    pub fn south(zone: u8) -> Self {
        Self {
            lon0: (f64::from(zone) * 6.0 - 183.0).to_radians(),
        }
    }

    pub fn inverse(&self, p: Coord<f64>) -> Coord<f64> {
        let e2 = grs80_e2();
        let ep2 = e2 / (1.0 - e2);
        let e4 = e2 * e2;
        let e6 = e4 * e2;

        let m = (p.y - Self::FALSE_NORTHING) / Self::K0;
        let mu = m / (GRS80_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

        let sqrt1 = (1.0 - e2).sqrt();
        let e1 = (1.0 - sqrt1) / (1.0 + sqrt1);
        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let (sin1, cos1, tan1) = (phi1.sin(), phi1.cos(), phi1.tan());
        let c1 = ep2 * cos1 * cos1;
        let t1 = tan1 * tan1;
        let w = 1.0 - e2 * sin1 * sin1;
        let n1 = GRS80_A / w.sqrt();
        let r1 = GRS80_A * (1.0 - e2) / w.powf(1.5);
        let d = (p.x - Self::FALSE_EASTING) / (n1 * Self::K0);

        let phi = phi1
            - (n1 * tan1 / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);
        let lon = self.lon0
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                    * d.powi(5)
                    / 120.0)
                / cos1;

        Coord {
            x: lon.to_degrees(),
            y: phi.to_degrees(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_parse_epsg_identifiers() {
        assert_eq!(Crs::parse_epsg("EPSG:7844"), Some(7844));
        assert_eq!(Crs::parse_epsg("urn:ogc:def:crs:EPSG::4283"), Some(4283));
        assert_eq!(
            Crs::parse_epsg("http://www.opengis.net/def/crs/EPSG/0/3577"),
            Some(3577)
        );
        assert_eq!(Crs::parse_epsg("urn:ogc:def:crs:OGC:1.3:CRS84"), Some(4326));
        assert_eq!(Crs::parse_epsg("GDA2020"), None);
        assert_eq!(Crs::parse_epsg("EPSG:"), None);
    }

    #[test]
    fn test_supported_codes() {
        assert!(Crs::from_epsg(7844).unwrap().is_geographic());
        assert_eq!(
            Crs::from_epsg(28352),
            Some(Crs::Mga {
                epsg: 28352,
                zone: 52
            })
        );
        assert_eq!(Crs::from_epsg(7855).map(|c| c.epsg()), Some(7855));
        assert!(Crs::from_epsg(2193).is_none());
    }

    #[test]
    fn test_albers_round_trip() {
        let albers = Albers::australian();
        for (lon, lat) in [(130.84, -12.46), (151.21, -33.87), (115.86, -31.95), (147.3, -42.9)] {
            let projected = albers.forward(Coord { x: lon, y: lat });
            let back = albers.inverse(projected);
            assert!(close(back.x, lon, 1e-8), "lon {} -> {}", lon, back.x);
            assert!(close(back.y, lat, 1e-8), "lat {} -> {}", lat, back.y);
        }
    }

    #[test]
    fn test_albers_central_meridian() {
        let albers = Albers::australian();
        let projected = albers.forward(Coord { x: 132.0, y: -25.0 });
        assert!(close(projected.x, 0.0, 1e-6));
        // Southern hemisphere: northing is negative
        assert!(projected.y < -2_000_000.0);
    }

    #[test]
    fn test_web_mercator_inverse() {
        let r = Reprojection::WebMercator;
        let origin = r.apply(Coord { x: 0.0, y: 0.0 });
        assert!(close(origin.x, 0.0, 1e-12) && close(origin.y, 0.0, 1e-12));

        let edge = r.apply(Coord {
            x: 20_037_508.342_789_244,
            y: 0.0,
        });
        assert!(close(edge.x, 180.0, 1e-9));
    }

    #[test]
    fn test_mga_central_meridian_and_equator() {
        let utm = Utm::south(52);
        let p = utm.inverse(Coord {
            x: 500_000.0,
            y: 10_000_000.0,
        });
        assert!(close(p.x, 129.0, 1e-9));
        assert!(close(p.y, 0.0, 1e-9));
    }

    #[test]
    fn test_mga_darwin() {
        // Royal Darwin Hospital in MGA zone 52
        let p = Utm::south(52).inverse(Coord {
            x: 699_900.0,
            y: 8_622_150.0,
        });
        assert!(close(p.x, 130.84, 0.02), "lon {}", p.x);
        assert!(close(p.y, -12.46, 0.02), "lat {}", p.y);
    }
}

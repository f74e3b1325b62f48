use std::f64::consts::FRAC_PI_4;

/// WGS84 semi-major axis (meters); the sphere radius of Web Mercator.
pub const WGS84_A: f64 = 6_378_137.0;

/// Latitude at which Web Mercator becomes a square world (degrees).
pub const MAX_MERCATOR_LAT_DEG: f64 = 85.051_128_779_806_59;

/// Geographic coordinates (EPSG:4326), degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LonLat {
    pub lon_deg: f64,
    pub lat_deg: f64,
}

impl LonLat {
    pub fn new(lon_deg: f64, lat_deg: f64) -> Self {
        Self { lon_deg, lat_deg }
    }
}

/// Point in the render CRS (Web Mercator, EPSG:3857), meters.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct RenderPoint {
    pub x: f64,
    pub y: f64,
}

impl RenderPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// Projects geographic coordinates into the render CRS.
///
/// Latitudes beyond [`MAX_MERCATOR_LAT_DEG`] are clamped, so this is not
/// invertible for polar input. Display use only; never store projected
/// coordinates as a substitute for the source data.
pub fn project(p: LonLat) -> RenderPoint {
    let lat = p
        .lat_deg
        .clamp(-MAX_MERCATOR_LAT_DEG, MAX_MERCATOR_LAT_DEG)
        .to_radians();
    let x = WGS84_A * p.lon_deg.to_radians();
    let y = WGS84_A * (FRAC_PI_4 + lat / 2.0).tan().ln();
    RenderPoint::new(x, y)
}

//! Hex-encoded WKB / PostGIS EWKB reader (what `wkb_geometry` columns hold).

use foundation::math::LonLat;

use crate::geometry::{Geometry, GeometryError};

const EWKB_Z: u32 = 0x8000_0000;
const EWKB_M: u32 = 0x4000_0000;
const EWKB_SRID: u32 = 0x2000_0000;

/// Even-length, all-hex strings of at least a WKB header are treated as WKB.
pub fn looks_like_hex(text: &str) -> bool {
    text.len() >= 18 && text.len() % 2 == 0 && text.bytes().all(|b| b.is_ascii_hexdigit())
}

pub fn decode_hex(text: &str) -> Result<Geometry<LonLat>, GeometryError> {
    let bytes = hex_to_bytes(text)?;
    let mut r = WkbReader {
        buf: &bytes,
        pos: 0,
        little_endian: true,
    };
    let geom = r.geometry()?;
    if r.pos != bytes.len() {
        return Err(GeometryError::new("trailing bytes after WKB geometry"));
    }
    Ok(geom)
}

fn hex_to_bytes(text: &str) -> Result<Vec<u8>, GeometryError> {
    let digits = text.as_bytes();
    let mut out = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks(2) {
        let s = std::str::from_utf8(pair).map_err(|_| GeometryError::new("invalid hex"))?;
        let b = u8::from_str_radix(s, 16).map_err(|_| GeometryError::new("invalid hex"))?;
        out.push(b);
    }
    Ok(out)
}

struct WkbReader<'a> {
    buf: &'a [u8],
    pos: usize,
    little_endian: bool,
}

impl WkbReader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], GeometryError> {
        let end = self.pos + N;
        let slice = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| GeometryError::new("WKB truncated"))?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        self.pos = end;
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32, GeometryError> {
        let b = self.take::<4>()?;
        Ok(if self.little_endian {
            u32::from_le_bytes(b)
        } else {
            u32::from_be_bytes(b)
        })
    }

    fn f64(&mut self) -> Result<f64, GeometryError> {
        let b = self.take::<8>()?;
        Ok(if self.little_endian {
            f64::from_le_bytes(b)
        } else {
            f64::from_be_bytes(b)
        })
    }

    fn count(&mut self) -> Result<usize, GeometryError> {
        let n = self.u32()? as usize;
        // Each element takes at least one byte, so a larger count is corrupt.
        if n > self.buf.len().saturating_sub(self.pos) {
            return Err(GeometryError::new("WKB element count exceeds payload"));
        }
        Ok(n)
    }

    /// Reads a byte-order marker and type code; returns the base type and
    /// the number of ordinates per position.
    fn header(&mut self) -> Result<(u32, usize), GeometryError> {
        let [order] = self.take::<1>()?;
        self.little_endian = match order {
            0 => false,
            1 => true,
            other => return Err(GeometryError::new(format!("bad WKB byte order {other}"))),
        };

        let raw_type = self.u32()?;
        let mut dims = 2;
        if raw_type & EWKB_Z != 0 {
            dims += 1;
        }
        if raw_type & EWKB_M != 0 {
            dims += 1;
        }
        if raw_type & EWKB_SRID != 0 {
            self.u32()?;
        }
        // ISO WKB encodes Z/M/ZM as +1000/+2000/+3000 on the type code.
        let iso = raw_type & 0x0FFF_FFFF;
        dims += match iso / 1000 {
            0 => 0,
            1 | 2 => 1,
            3 => 2,
            _ => return Err(GeometryError::new(format!("bad WKB type {raw_type:#x}"))),
        };
        Ok((iso % 1000, dims))
    }

    /// Header of a Multi* member, which must be the matching simple type.
    /// Members are never collections, so no recursion happens here.
    fn member(&mut self, want: u32, parent: &str) -> Result<usize, GeometryError> {
        let (ty, dims) = self.header()?;
        if ty != want {
            return Err(GeometryError::new(format!(
                "{parent} member has WKB type {ty}, expected {want}"
            )));
        }
        Ok(dims)
    }

    fn geometry(&mut self) -> Result<Geometry<LonLat>, GeometryError> {
        let (ty, dims) = self.header()?;
        match ty {
            1 => Ok(Geometry::Point(self.position(dims)?)),
            2 => Ok(Geometry::LineString(self.positions(dims)?)),
            3 => Ok(Geometry::Polygon(self.rings(dims)?)),
            4 => {
                let n = self.count()?;
                let mut pts = Vec::with_capacity(n);
                for _ in 0..n {
                    let d = self.member(1, "MultiPoint")?;
                    pts.push(self.position(d)?);
                }
                Ok(Geometry::MultiPoint(pts))
            }
            5 => {
                let n = self.count()?;
                let mut lines = Vec::with_capacity(n);
                for _ in 0..n {
                    let d = self.member(2, "MultiLineString")?;
                    lines.push(self.positions(d)?);
                }
                Ok(Geometry::MultiLineString(lines))
            }
            6 => {
                let n = self.count()?;
                let mut polys = Vec::with_capacity(n);
                for _ in 0..n {
                    let d = self.member(3, "MultiPolygon")?;
                    polys.push(self.rings(d)?);
                }
                Ok(Geometry::MultiPolygon(polys))
            }
            other => Err(GeometryError::new(format!("unsupported WKB type {other}"))),
        }
    }

    fn position(&mut self, dims: usize) -> Result<LonLat, GeometryError> {
        let x = self.f64()?;
        let y = self.f64()?;
        for _ in 2..dims {
            self.f64()?;
        }
        Ok(LonLat::new(x, y))
    }

    fn positions(&mut self, dims: usize) -> Result<Vec<LonLat>, GeometryError> {
        let n = self.count()?;
        (0..n).map(|_| self.position(dims)).collect()
    }

    fn rings(&mut self, dims: usize) -> Result<Vec<Vec<LonLat>>, GeometryError> {
        let n = self.count()?;
        (0..n).map(|_| self.positions(dims)).collect()
    }
}

#[cfg(test)]
mod tests {
    use foundation::math::LonLat;

    use super::{decode_hex, looks_like_hex};
    use crate::geometry::Geometry;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02X}")).collect()
    }

    fn le_point(srid: Option<u32>, x: f64, y: f64) -> Vec<u8> {
        let mut out = vec![1u8];
        let ty: u32 = if srid.is_some() { 0x2000_0001 } else { 1 };
        out.extend(ty.to_le_bytes());
        if let Some(srid) = srid {
            out.extend(srid.to_le_bytes());
        }
        out.extend(x.to_le_bytes());
        out.extend(y.to_le_bytes());
        out
    }

    #[test]
    fn decodes_ewkb_point_with_srid() {
        let text = hex(&le_point(Some(4326), 32.85, 39.93));
        assert!(looks_like_hex(&text));
        assert_eq!(decode_hex(&text).unwrap(), Geometry::Point(LonLat::new(32.85, 39.93)));
    }

    #[test]
    fn decodes_big_endian_linestring() {
        let mut b = vec![0u8];
        b.extend(2u32.to_be_bytes());
        b.extend(2u32.to_be_bytes());
        for v in [0.0f64, 0.0, 1.0, 2.0] {
            b.extend(v.to_be_bytes());
        }
        let g = decode_hex(&hex(&b)).unwrap();
        assert_eq!(
            g,
            Geometry::LineString(vec![LonLat::new(0.0, 0.0), LonLat::new(1.0, 2.0)])
        );
    }

    #[test]
    fn decodes_multipolygon_of_nested_geometries() {
        let mut poly = vec![1u8];
        poly.extend(3u32.to_le_bytes());
        poly.extend(1u32.to_le_bytes());
        poly.extend(4u32.to_le_bytes());
        for v in [0.0f64, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0] {
            poly.extend(v.to_le_bytes());
        }
        let mut b = vec![1u8];
        b.extend(6u32.to_le_bytes());
        b.extend(2u32.to_le_bytes());
        b.extend(&poly);
        b.extend(&poly);

        let Geometry::MultiPolygon(polys) = decode_hex(&hex(&b)).unwrap() else {
            panic!("expected multipolygon");
        };
        assert_eq!(polys.len(), 2);
        assert_eq!(polys[0][0].len(), 4);
    }

    #[test]
    fn rejects_nested_collections_without_deep_recursion() {
        let depth = 200_000;
        let mut b = Vec::with_capacity(depth * 9 + 21);
        for _ in 0..depth {
            b.push(1u8);
            b.extend(4u32.to_le_bytes());
            b.extend(1u32.to_le_bytes());
        }
        b.extend(le_point(None, 1.0, 2.0));

        let err = decode_hex(&hex(&b)).unwrap_err();
        assert!(err.message.contains("MultiPoint member"), "{err}");
    }

    #[test]
    fn rejects_mismatched_member_type() {
        let mut b = vec![1u8];
        b.extend(6u32.to_le_bytes());
        b.extend(1u32.to_le_bytes());
        b.extend(le_point(None, 0.0, 0.0));
        assert!(decode_hex(&hex(&b)).is_err());
    }

    #[test]
    fn rejects_truncated_input() {
        let mut bytes = le_point(None, 1.0, 2.0);
        bytes.truncate(bytes.len() - 3);
        assert!(decode_hex(&hex(&bytes)).is_err());
    }
}

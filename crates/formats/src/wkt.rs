use foundation::math::LonLat;

use crate::geometry::{Geometry, GeometryError};

pub fn parse(text: &str) -> Result<Geometry<LonLat>, GeometryError> {
    let body = strip_srid(text.trim());
    let mut r = Reader {
        s: body.as_bytes(),
        pos: 0,
    };

    let tag = r.word().to_ascii_uppercase();
    if tag.is_empty() {
        return Err(GeometryError::new("WKT missing geometry tag"));
    }
    r.skip_ws();
    if r.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
        match r.word().to_ascii_uppercase().as_str() {
            "Z" | "M" | "ZM" => {}
            "EMPTY" => return Err(GeometryError::new(format!("{tag} EMPTY"))),
            other => return Err(GeometryError::new(format!("unexpected WKT token: {other}"))),
        }
    }

    let geom = match tag.as_str() {
        "POINT" => {
            r.expect(b'(')?;
            let p = r.coord()?;
            r.expect(b')')?;
            Geometry::Point(p)
        }
        "LINESTRING" => Geometry::LineString(r.coord_list()?),
        "POLYGON" => Geometry::Polygon(r.list_of(Reader::coord_list)?),
        "MULTIPOINT" => Geometry::MultiPoint(r.list_of(Reader::multipoint_member)?),
        "MULTILINESTRING" => Geometry::MultiLineString(r.list_of(Reader::coord_list)?),
        "MULTIPOLYGON" => {
            Geometry::MultiPolygon(r.list_of(|r| r.list_of(Reader::coord_list))?)
        }
        other => return Err(GeometryError::new(format!("unsupported WKT type: {other}"))),
    };

    r.skip_ws();
    if r.pos != r.s.len() {
        return Err(GeometryError::new("trailing characters after WKT geometry"));
    }
    Ok(geom)
}

fn strip_srid(text: &str) -> &str {
    let upper_prefix = text.get(..5).map(|p| p.eq_ignore_ascii_case("SRID="));
    if upper_prefix == Some(true)
        && let Some((_, rest)) = text.split_once(';')
    {
        return rest.trim_start();
    }
    text
}

struct Reader<'a> {
    s: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn peek(&self) -> Option<u8> {
        self.s.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn word(&mut self) -> String {
        self.skip_ws();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.s[start..self.pos]).into_owned()
    }

    fn expect(&mut self, want: u8) -> Result<(), GeometryError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == want => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(GeometryError::new(format!(
                "expected '{}' at offset {}, found '{}'",
                want as char, self.pos, c as char
            ))),
            None => Err(GeometryError::new(format!(
                "expected '{}' but WKT ended",
                want as char
            ))),
        }
    }

    fn number(&mut self) -> Result<f64, GeometryError> {
        self.skip_ws();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, b'+' | b'-' | b'.' | b'e' | b'E'))
        {
            self.pos += 1;
        }
        let raw = std::str::from_utf8(&self.s[start..self.pos]).unwrap_or("");
        raw.parse::<f64>()
            .map_err(|_| GeometryError::new(format!("bad WKT number at offset {start}")))
    }

    fn coord(&mut self) -> Result<LonLat, GeometryError> {
        let x = self.number()?;
        let y = self.number()?;
        // Optional Z and M ordinates.
        loop {
            self.skip_ws();
            match self.peek() {
                Some(b',') | Some(b')') | None => break,
                _ => {
                    self.number()?;
                }
            }
        }
        Ok(LonLat::new(x, y))
    }

    fn coord_list(&mut self) -> Result<Vec<LonLat>, GeometryError> {
        self.list_of(Reader::coord)
    }

    fn multipoint_member(&mut self) -> Result<LonLat, GeometryError> {
        self.skip_ws();
        if self.peek() == Some(b'(') {
            self.expect(b'(')?;
            let p = self.coord()?;
            self.expect(b')')?;
            Ok(p)
        } else {
            self.coord()
        }
    }

    fn list_of<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, GeometryError>,
    ) -> Result<Vec<T>, GeometryError> {
        self.expect(b'(')?;
        let mut out = Vec::new();
        loop {
            out.push(item(self)?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return Ok(out);
                }
                _ => return Err(GeometryError::new("unterminated WKT list")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use foundation::math::LonLat;

    use super::parse;
    use crate::geometry::Geometry;

    #[test]
    fn parses_point_with_srid_prefix() {
        let g = parse("SRID=4326;POINT (32.5 39.9)").unwrap();
        assert_eq!(g, Geometry::Point(LonLat::new(32.5, 39.9)));
    }

    #[test]
    fn parses_polygon_with_hole() {
        let g = parse("POLYGON ((0 0, 4 0, 4 4, 0 0), (1 1, 2 1, 2 2, 1 1))").unwrap();
        let Geometry::Polygon(rings) = g else {
            panic!("expected polygon");
        };
        assert_eq!(rings.len(), 2);
        assert_eq!(rings[1][0], LonLat::new(1.0, 1.0));
    }

    #[test]
    fn parses_multipolygon_and_drops_z() {
        let g = parse("MULTIPOLYGON Z (((0 0 5, 1 0 5, 1 1 5, 0 0 5)), ((2 2 1, 3 2 1, 3 3 1, 2 2 1)))")
            .unwrap();
        let Geometry::MultiPolygon(polys) = g else {
            panic!("expected multipolygon");
        };
        assert_eq!(polys.len(), 2);
        assert_eq!(polys[1][0][2], LonLat::new(3.0, 3.0));
    }

    #[test]
    fn multipoint_accepts_both_spellings() {
        let a = parse("MULTIPOINT ((1 2), (3 4))").unwrap();
        let b = parse("multipoint (1 2, 3 4)").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(parse("POINT EMPTY").is_err());
        assert!(parse("POINT (1)").is_err());
        assert!(parse("LINESTRING (0 0, 1 1").is_err());
        assert!(parse("CIRCLE (0 0, 1)").is_err());
        assert!(parse("POINT (1 2) junk").is_err());
    }
}

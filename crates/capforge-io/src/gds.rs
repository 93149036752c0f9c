//! GDS-II stream reader and writer.
//!
//! Each record is `[u16 length][u8 record kind][u8 data type][payload]`,
//! big-endian. A library is `HEADER BGNLIB LIBNAME UNITS {structure} ENDLIB`
//! and a structure is `BGNSTR STRNAME {element} ENDSTR`.
//!
//! Supported elements: BOUNDARY, BOX, PATH, SREF and TEXT. AREF and NODE
//! are skipped with a warning. Layer *and* datatype are preserved, so
//! `Metal4.drawing` (50/0) and `Metal4.nofill` (50/23) stay distinct.

use std::collections::HashMap;
use std::io::{self, Read, Write};

use thiserror::Error;

use capforge_core::{
    BBox, Cell, CellId, CellInstance, GeomPrimitive, HierarchyError, Label, LayerId,
    LayoutDatabase, Path, Point, Polygon, Rect, Transform,
};

mod record_type {
    pub const HEADER: u16 = 0x0002;
    pub const BGNLIB: u16 = 0x0102;
    pub const LIBNAME: u16 = 0x0206;
    pub const UNITS: u16 = 0x0305;
    pub const ENDLIB: u16 = 0x0400;
    pub const BGNSTR: u16 = 0x0502;
    pub const STRNAME: u16 = 0x0606;
    pub const ENDSTR: u16 = 0x0700;
    pub const BOUNDARY: u16 = 0x0800;
    pub const PATH: u16 = 0x0900;
    pub const SREF: u16 = 0x0A00;
    pub const AREF: u16 = 0x0B00;
    pub const TEXT: u16 = 0x0C00;
    pub const LAYER: u16 = 0x0D02;
    pub const DATATYPE: u16 = 0x0E02;
    pub const WIDTH: u16 = 0x0F03;
    pub const XY: u16 = 0x1003;
    pub const ENDEL: u16 = 0x1100;
    pub const SNAME: u16 = 0x1206;
    pub const NODE: u16 = 0x1500;
    pub const TEXTTYPE: u16 = 0x1602;
    pub const STRING: u16 = 0x1906;
    pub const STRANS: u16 = 0x1A01;
    pub const MAG: u16 = 0x1B05;
    pub const ANGLE: u16 = 0x1C05;
    pub const PATHTYPE: u16 = 0x2102;
    pub const BOX: u16 = 0x2D00;
    pub const BOXTYPE: u16 = 0x2E02;
}

const STRANS_REFLECT: i16 = i16::MIN;

/// Fixed modification/access stamp, so identical layouts give identical files.
const TIMESTAMP: [i16; 12] = [2026, 2, 6, 0, 0, 0, 2026, 2, 6, 0, 0, 0];

#[derive(Error, Debug)]
pub enum GdsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid GDS-II record at offset {offset}: {message}")]
    InvalidRecord { offset: u64, message: String },

    #[error("Unexpected record type 0x{record_type:04X}, expected 0x{expected:04X}")]
    UnexpectedRecord { record_type: u16, expected: u16 },

    #[error("Cell '{0}' referenced but not defined")]
    UndefinedCell(String),

    #[error("Coordinate {0} µm does not fit the database grid")]
    CoordinateOverflow(f64),

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
}

#[derive(Debug)]
struct GdsRecord {
    record_type: u16,
    data: Vec<u8>,
}

impl GdsRecord {
    fn as_i16_vec(&self) -> Vec<i16> {
        self.data
            .chunks_exact(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
            .collect()
    }

    fn first_i16(&self) -> Option<i16> {
        self.as_i16_vec().first().copied()
    }

    fn as_i32_vec(&self) -> Vec<i32> {
        self.data
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    fn as_string(&self) -> String {
        let s: String = self.data.iter().map(|&b| b as char).collect();
        s.trim_end_matches('\0').to_string()
    }

    fn as_f64_vec(&self) -> Vec<f64> {
        self.data
            .chunks_exact(8)
            .map(|c| {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(c);
                gds_real8_to_f64(&bytes)
            })
            .collect()
    }
}

/// Convert GDS-II excess-64 real format to IEEE 754 f64.
fn gds_real8_to_f64(bytes: &[u8; 8]) -> f64 {
    if bytes.iter().all(|&b| b == 0) {
        return 0.0;
    }

    let sign = if bytes[0] & 0x80 != 0 { -1.0 } else { 1.0 };
    let exponent = (bytes[0] & 0x7F) as i32 - 64;
    let mantissa = bytes[1..].iter().fold(0u64, |m, &b| (m << 8) | b as u64);

    sign * (mantissa as f64 / (1u64 << 56) as f64) * 16.0_f64.powi(exponent)
}

/// Convert IEEE 754 f64 to GDS-II excess-64 real format.
fn f64_to_gds_real8(value: f64) -> [u8; 8] {
    if value == 0.0 {
        return [0u8; 8];
    }

    let sign_bit: u8 = if value < 0.0 { 0x80 } else { 0x00 };
    let mut val = value.abs();

    // Normalize to 1/16 <= mantissa < 1
    let mut exponent: i32 = 0;
    while val >= 1.0 && exponent < 63 {
        val /= 16.0;
        exponent += 1;
    }
    while val < 1.0 / 16.0 && exponent > -64 {
        val *= 16.0;
        exponent -= 1;
    }

    let mantissa = (val * (1u64 << 56) as f64).round() as u64;
    let mut result = mantissa.to_be_bytes();
    result[0] = sign_bit | ((exponent + 64) as u8 & 0x7F);
    result
}

/// Everything an element may carry; unused fields stay at their defaults.
#[derive(Debug, Default)]
struct Element {
    layer: u16,
    datatype: u16,
    width: i32,
    xy: Vec<(i32, i32)>,
    sname: String,
    strans: i16,
    mag: Option<f64>,
    angle: Option<f64>,
    string: String,
}

impl Element {
    fn layer_id(&self) -> LayerId {
        LayerId::new(self.layer, self.datatype)
    }
}

/// An SREF waiting for its target structure to be read.
struct PendingRef {
    parent: CellId,
    sname: String,
    transform: Transform,
}

// ── Reader ───────────────────────────────────────────────────────────

pub struct GdsReader<R: Read> {
    reader: R,
    offset: u64,
    db_unit_in_um: f64,
}

impl<R: Read> GdsReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            offset: 0,
            db_unit_in_um: 0.001,
        }
    }

    /// Read the whole stream. Structure references are resolved by name
    /// once every structure is known; the top cell is the first structure
    /// nobody references.
    pub fn read(&mut self) -> Result<LayoutDatabase, GdsError> {
        let mut db = LayoutDatabase::new("imported");
        let mut pending = Vec::new();

        self.read_header()?;
        self.read_lib(&mut db, &mut pending)?;
        Self::resolve_references(&mut db, pending)?;

        Ok(db)
    }

    fn read_record(&mut self) -> Result<Option<GdsRecord>, GdsError> {
        let mut len_buf = [0u8; 2];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(GdsError::Io(e)),
        }

        let total_len = u16::from_be_bytes(len_buf) as usize;
        if total_len < 4 {
            return Err(GdsError::InvalidRecord {
                offset: self.offset,
                message: format!("Record length {} is too small", total_len),
            });
        }

        let mut type_buf = [0u8; 2];
        self.reader.read_exact(&mut type_buf)?;
        let record_type = u16::from_be_bytes(type_buf);

        let mut data = vec![0u8; total_len - 4];
        self.reader.read_exact(&mut data)?;
        self.offset += total_len as u64;

        Ok(Some(GdsRecord { record_type, data }))
    }

    fn expect_record(&mut self) -> Result<GdsRecord, GdsError> {
        self.read_record()?.ok_or_else(|| GdsError::InvalidRecord {
            offset: self.offset,
            message: "Unexpected end of stream".into(),
        })
    }

    fn read_header(&mut self) -> Result<(), GdsError> {
        let rec = self.expect_record()?;
        if rec.record_type != record_type::HEADER {
            return Err(GdsError::UnexpectedRecord {
                record_type: rec.record_type,
                expected: record_type::HEADER,
            });
        }
        if let Some(version) = rec.first_i16() {
            log::debug!("GDS-II version: {}", version);
        }
        Ok(())
    }

    fn read_lib(
        &mut self,
        db: &mut LayoutDatabase,
        pending: &mut Vec<PendingRef>,
    ) -> Result<(), GdsError> {
        loop {
            let rec = self.expect_record()?;
            match rec.record_type {
                record_type::LIBNAME => db.name = rec.as_string(),
                record_type::UNITS => {
                    let units = rec.as_f64_vec();
                    if units.len() >= 2 {
                        self.db_unit_in_um = units[1] * 1e6;
                        log::debug!("Database unit: {} µm", self.db_unit_in_um);
                    }
                }
                record_type::BGNSTR => self.read_structure(db, pending)?,
                record_type::ENDLIB => break,
                _ => {}
            }
        }
        log::info!("Read library '{}': {} cells", db.name, db.cell_count());
        Ok(())
    }

    fn read_structure(
        &mut self,
        db: &mut LayoutDatabase,
        pending: &mut Vec<PendingRef>,
    ) -> Result<(), GdsError> {
        let mut cell = Cell::new("unnamed");
        let mut refs = Vec::new();

        loop {
            let rec = self.expect_record()?;
            match rec.record_type {
                record_type::STRNAME => cell.name = rec.as_string(),
                record_type::BOUNDARY | record_type::BOX => {
                    let el = self.read_element()?;
                    if let Some(geom) = self.boundary(&el) {
                        cell.add_geometry(geom);
                    }
                }
                record_type::PATH => {
                    let el = self.read_element()?;
                    if !el.xy.is_empty() {
                        let points = self.points(&el.xy);
                        let width = el.width.unsigned_abs() as f64 * self.db_unit_in_um;
                        cell.add_geometry(GeomPrimitive::Path(Path::new(el.layer_id(), points, width)));
                    }
                }
                record_type::TEXT => {
                    let el = self.read_element()?;
                    if let Some(&origin) = el.xy.first() {
                        let position = self.point(origin);
                        cell.labels.push(Label::new(&el.string, position, el.layer_id()));
                    }
                }
                record_type::SREF => {
                    let el = self.read_element()?;
                    if !el.sname.is_empty() {
                        refs.push((el.sname.clone(), self.transform(&el)));
                    }
                }
                record_type::AREF | record_type::NODE => {
                    log::warn!(
                        "Skipping unsupported element 0x{:04X} in '{}'",
                        rec.record_type,
                        cell.name
                    );
                    self.read_element()?;
                }
                record_type::ENDSTR => break,
                _ => {}
            }
        }

        log::debug!(
            "Read cell '{}': {} shapes, {} labels, {} references",
            cell.name,
            cell.geometry_count(),
            cell.labels.len(),
            refs.len()
        );
        let parent = db.add_cell(cell);
        pending.extend(refs.into_iter().map(|(sname, transform)| PendingRef {
            parent,
            sname,
            transform,
        }));
        Ok(())
    }

    fn read_element(&mut self) -> Result<Element, GdsError> {
        let mut el = Element::default();
        loop {
            let rec = self.expect_record()?;
            match rec.record_type {
                record_type::LAYER => el.layer = rec.first_i16().unwrap_or(0) as u16,
                record_type::DATATYPE | record_type::TEXTTYPE | record_type::BOXTYPE => {
                    el.datatype = rec.first_i16().unwrap_or(0) as u16
                }
                record_type::WIDTH => el.width = rec.as_i32_vec().first().copied().unwrap_or(0),
                record_type::XY => {
                    el.xy = rec
                        .as_i32_vec()
                        .chunks_exact(2)
                        .map(|p| (p[0], p[1]))
                        .collect()
                }
                record_type::SNAME => el.sname = rec.as_string(),
                record_type::STRING => el.string = rec.as_string(),
                record_type::STRANS => el.strans = rec.first_i16().unwrap_or(0),
                record_type::MAG => el.mag = rec.as_f64_vec().first().copied(),
                record_type::ANGLE => el.angle = rec.as_f64_vec().first().copied(),
                record_type::ENDEL => return Ok(el),
                _ => {}
            }
        }
    }

    fn point(&self, (x, y): (i32, i32)) -> Point {
        Point::new(x as f64 * self.db_unit_in_um, y as f64 * self.db_unit_in_um)
    }

    fn points(&self, xy: &[(i32, i32)]) -> Vec<Point> {
        xy.iter().map(|&p| self.point(p)).collect()
    }

    fn boundary(&self, el: &Element) -> Option<GeomPrimitive> {
        let mut xy = el.xy.clone();
        // Boundaries repeat the first point
        if xy.len() > 1 && xy.first() == xy.last() {
            xy.pop();
        }
        if xy.len() < 3 {
            return None;
        }

        let points = self.points(&xy);
        if is_axis_aligned_rect(&xy) {
            let bbox = BBox::from_points(&points)?;
            return Some(GeomPrimitive::Rect(Rect::from_bbox(el.layer_id(), &bbox)));
        }
        Some(GeomPrimitive::Polygon(Polygon::new(el.layer_id(), points)))
    }

    fn transform(&self, el: &Element) -> Transform {
        Transform {
            offset: el.xy.first().map_or(Point::new(0.0, 0.0), |&p| self.point(p)),
            rotation: el.angle.unwrap_or(0.0),
            mirror_x: el.strans & STRANS_REFLECT != 0,
            scale: el.mag.unwrap_or(1.0),
        }
    }

    fn resolve_references(db: &mut LayoutDatabase, pending: Vec<PendingRef>) -> Result<(), GdsError> {
        let by_name: HashMap<String, CellId> = db
            .all_cells()
            .map(|c| (c.name.clone(), c.id))
            .collect();

        let mut referenced = Vec::new();
        for (i, r) in pending.into_iter().enumerate() {
            let child = *by_name
                .get(&r.sname)
                .ok_or_else(|| GdsError::UndefinedCell(r.sname.clone()))?;
            db.add_instance(r.parent, child, &format!("{}_{}", r.sname, i), r.transform)?;
            referenced.push(child);
        }

        let top = db
            .all_cells()
            .map(|c| c.id)
            .find(|id| !referenced.contains(id))
            .or(db.top_cell);
        db.top_cell = top;
        Ok(())
    }
}

/// Four corners joined by alternating horizontal and vertical edges.
fn is_axis_aligned_rect(xy: &[(i32, i32)]) -> bool {
    if xy.len() != 4 {
        return false;
    }
    let edges_ok = (0..4).all(|i| {
        let (a, b) = (xy[i], xy[(i + 1) % 4]);
        let (c, d) = (xy[(i + 1) % 4], xy[(i + 2) % 4]);
        (a.0 == b.0 && c.1 == d.1) || (a.1 == b.1 && c.0 == d.0)
    });
    edges_ok && xy[0] != xy[2]
}

// ── Writer ───────────────────────────────────────────────────────────

pub struct GdsWriter<W: Write> {
    writer: W,
    db_unit_in_um: f64,
}

impl<W: Write> GdsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            db_unit_in_um: 0.001,
        }
    }

    /// Write every cell of the library.
    pub fn write(&mut self, db: &LayoutDatabase) -> Result<(), GdsError> {
        let cells: Vec<&Cell> = db.all_cells().collect();
        self.write_library(db, &cells)
    }

    /// Write `top` and every cell it depends on, children first.
    pub fn write_cell_tree(&mut self, db: &LayoutDatabase, top: CellId) -> Result<(), GdsError> {
        let cells = db
            .dependencies(top)?
            .iter()
            .map(|id| db.get_cell(id).ok_or(HierarchyError::UndefinedCell(*id)))
            .collect::<Result<Vec<_>, _>>()?;
        self.write_library(db, &cells)
    }

    fn write_library(&mut self, db: &LayoutDatabase, cells: &[&Cell]) -> Result<(), GdsError> {
        self.write_i16_record(record_type::HEADER, &[600])?;
        self.write_i16_record(record_type::BGNLIB, &TIMESTAMP)?;
        self.write_string_record(record_type::LIBNAME, &db.name)?;
        self.write_real8_record(
            record_type::UNITS,
            &[self.db_unit_in_um, self.db_unit_in_um * 1e-6],
        )?;

        for cell in cells {
            self.write_cell(db, cell)?;
        }

        self.write_record(record_type::ENDLIB, &[])?;
        self.writer.flush()?;
        Ok(())
    }

    fn write_record(&mut self, record_type: u16, data: &[u8]) -> Result<(), GdsError> {
        let total_len = u16::try_from(data.len() + 4).map_err(|_| GdsError::InvalidRecord {
            offset: 0,
            message: format!("Record payload of {} bytes is too long", data.len()),
        })?;
        self.writer.write_all(&total_len.to_be_bytes())?;
        self.writer.write_all(&record_type.to_be_bytes())?;
        self.writer.write_all(data)?;
        Ok(())
    }

    fn write_i16_record(&mut self, record_type: u16, values: &[i16]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_i32_record(&mut self, record_type: u16, values: &[i32]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        self.write_record(record_type, &data)
    }

    fn write_string_record(&mut self, record_type: u16, s: &str) -> Result<(), GdsError> {
        let mut data: Vec<u8> = s.bytes().collect();
        if data.len() % 2 != 0 {
            data.push(0);
        }
        self.write_record(record_type, &data)
    }

    fn write_real8_record(&mut self, record_type: u16, values: &[f64]) -> Result<(), GdsError> {
        let data: Vec<u8> = values.iter().flat_map(|v| f64_to_gds_real8(*v)).collect();
        self.write_record(record_type, &data)
    }

    fn write_layer(&mut self, datatype_record: u16, layer: LayerId) -> Result<(), GdsError> {
        self.write_i16_record(record_type::LAYER, &[layer.layer as i16])?;
        self.write_i16_record(datatype_record, &[layer.datatype as i16])
    }

    fn dbu(&self, value: f64) -> Result<i32, GdsError> {
        let scaled = (value / self.db_unit_in_um).round();
        if scaled.is_finite() && scaled >= i32::MIN as f64 && scaled <= i32::MAX as f64 {
            Ok(scaled as i32)
        } else {
            Err(GdsError::CoordinateOverflow(value))
        }
    }

    fn xy(&self, points: &[Point]) -> Result<Vec<i32>, GdsError> {
        let mut coords = Vec::with_capacity(points.len() * 2);
        for p in points {
            coords.push(self.dbu(p.x)?);
            coords.push(self.dbu(p.y)?);
        }
        Ok(coords)
    }

    fn write_cell(&mut self, db: &LayoutDatabase, cell: &Cell) -> Result<(), GdsError> {
        self.write_i16_record(record_type::BGNSTR, &TIMESTAMP)?;
        self.write_string_record(record_type::STRNAME, &cell.name)?;

        for geom in &cell.geometries {
            match geom {
                GeomPrimitive::Rect(rect) => self.write_rect(rect)?,
                GeomPrimitive::Polygon(poly) => self.write_boundary(poly.layer_id, &poly.vertices)?,
                GeomPrimitive::Path(path) => self.write_path(path)?,
                GeomPrimitive::Via(via) => self.write_rect(&via.cut_rect())?,
            }
        }
        for label in &cell.labels {
            self.write_text(label)?;
        }
        for inst in &cell.instances {
            let child = db
                .get_cell(&inst.cell_id)
                .ok_or(HierarchyError::UndefinedCell(inst.cell_id))?;
            self.write_sref(&child.name, inst)?;
        }

        self.write_record(record_type::ENDSTR, &[])
    }

    fn write_rect(&mut self, rect: &Rect) -> Result<(), GdsError> {
        let (ll, ur) = (rect.lower_left, rect.upper_right);
        self.write_boundary(
            rect.layer_id,
            &[ll, Point::new(ur.x, ll.y), ur, Point::new(ll.x, ur.y)],
        )
    }

    fn write_boundary(&mut self, layer: LayerId, vertices: &[Point]) -> Result<(), GdsError> {
        let Some(first) = vertices.first() else {
            return Ok(());
        };
        let mut coords = self.xy(vertices)?;
        coords.extend(self.xy(std::slice::from_ref(first))?);

        self.write_record(record_type::BOUNDARY, &[])?;
        self.write_layer(record_type::DATATYPE, layer)?;
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_path(&mut self, path: &Path) -> Result<(), GdsError> {
        let coords = self.xy(&path.points)?;
        let width = self.dbu(path.width)?;

        self.write_record(record_type::PATH, &[])?;
        self.write_layer(record_type::DATATYPE, path.layer_id)?;
        self.write_i16_record(record_type::PATHTYPE, &[0])?;
        self.write_i32_record(record_type::WIDTH, &[width])?;
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_text(&mut self, label: &Label) -> Result<(), GdsError> {
        let coords = self.xy(std::slice::from_ref(&label.position))?;

        self.write_record(record_type::TEXT, &[])?;
        self.write_layer(record_type::TEXTTYPE, label.layer_id)?;
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_string_record(record_type::STRING, &label.text)?;
        self.write_record(record_type::ENDEL, &[])
    }

    fn write_sref(&mut self, sname: &str, inst: &CellInstance) -> Result<(), GdsError> {
        let t = &inst.transform;
        let coords = self.xy(std::slice::from_ref(&t.offset))?;

        self.write_record(record_type::SREF, &[])?;
        self.write_string_record(record_type::SNAME, sname)?;
        if t.mirror_x || t.rotation != 0.0 || t.scale != 1.0 {
            let strans = if t.mirror_x { STRANS_REFLECT } else { 0 };
            self.write_i16_record(record_type::STRANS, &[strans])?;
            if t.scale != 1.0 {
                self.write_real8_record(record_type::MAG, &[t.scale])?;
            }
            if t.rotation != 0.0 {
                self.write_real8_record(record_type::ANGLE, &[t.rotation])?;
            }
        }
        self.write_i32_record(record_type::XY, &coords)?;
        self.write_record(record_type::ENDEL, &[])
    }
}

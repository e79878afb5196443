//! A plotters backend that records drawing operations and writes them out as
//! PostScript, EPS or a single-page PDF. Text uses the standard Helvetica
//! font, so no font files are needed.

use std::f64::consts::PI;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use perprof::OutputFormat;
use plotters_backend::{
    text_anchor, BackendColor, BackendCoord, BackendStyle, BackendTextStyle, DrawingBackend,
    DrawingErrorKind, FontTransform,
};

/// Average Helvetica glyph advance relative to the font size.
const GLYPH_WIDTH: f64 = 0.55;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VectorFormat {
    Ps,
    Eps,
    Pdf,
}

impl VectorFormat {
    pub fn for_output(format: OutputFormat) -> Option<Self> {
        match format {
            OutputFormat::Ps => Some(VectorFormat::Ps),
            OutputFormat::Eps => Some(VectorFormat::Eps),
            OutputFormat::Pdf => Some(VectorFormat::Pdf),
            _ => None,
        }
    }
}

type Paint = (u8, u8, u8);

#[derive(Clone, Debug, PartialEq)]
enum Op {
    Stroke {
        points: Vec<(f64, f64)>,
        paint: Paint,
        width: f64,
        closed: bool,
    },
    Fill {
        points: Vec<(f64, f64)>,
        paint: Paint,
    },
    Circle {
        center: (f64, f64),
        radius: f64,
        paint: Paint,
        width: f64,
        fill: bool,
    },
    Text {
        text: String,
        at: (f64, f64),
        offset: (f64, f64),
        size: f64,
        angle: f64,
        paint: Paint,
    },
}

pub struct VectorBackend {
    path: PathBuf,
    format: VectorFormat,
    size: (u32, u32),
    ops: Vec<Op>,
}

impl VectorBackend {
    pub fn new(path: &Path, format: VectorFormat, size: (u32, u32)) -> Self {
        Self {
            path: path.to_path_buf(),
            format,
            size,
            ops: Vec::new(),
        }
    }

    /// Pixel coordinates have y pointing down; page coordinates point up.
    fn flip(&self, (x, y): BackendCoord) -> (f64, f64) {
        (x as f64, self.size.1 as f64 - y as f64)
    }

    fn document(&self) -> String {
        match self.format {
            VectorFormat::Ps | VectorFormat::Eps => self.postscript(),
            VectorFormat::Pdf => self.pdf(),
        }
    }

    fn postscript(&self) -> String {
        let (w, h) = self.size;
        let mut out = String::new();
        if self.format == VectorFormat::Eps {
            out.push_str("%!PS-Adobe-3.0 EPSF-3.0\n");
        } else {
            out.push_str("%!PS-Adobe-3.0\n");
        }
        out.push_str(&format!("%%BoundingBox: 0 0 {w} {h}\n"));
        out.push_str("%%Creator: perprof\n");
        if self.format == VectorFormat::Ps {
            out.push_str("%%Pages: 1\n%%EndComments\n%%Page: 1 1\n");
            out.push_str(&format!("<< /PageSize [{w} {h}] >> setpagedevice\n"));
        } else {
            out.push_str("%%EndComments\n");
        }
        out.push_str("1 setlinejoin 1 setlinecap\n");

        for op in &self.ops {
            match op {
                Op::Stroke {
                    points,
                    paint,
                    width,
                    closed,
                } => {
                    out.push_str(&format!("{} setrgbcolor {:.2} setlinewidth newpath\n", rgb(*paint), width));
                    push_ps_path(&mut out, points);
                    if *closed {
                        out.push_str("closepath ");
                    }
                    out.push_str("stroke\n");
                }
                Op::Fill { points, paint } => {
                    out.push_str(&format!("{} setrgbcolor newpath\n", rgb(*paint)));
                    push_ps_path(&mut out, points);
                    out.push_str("closepath fill\n");
                }
                Op::Circle {
                    center,
                    radius,
                    paint,
                    width,
                    fill,
                } => {
                    out.push_str(&format!(
                        "{} setrgbcolor {:.2} setlinewidth newpath {:.2} {:.2} {:.2} 0 360 arc {}\n",
                        rgb(*paint),
                        width,
                        center.0,
                        center.1,
                        radius,
                        if *fill { "fill" } else { "stroke" }
                    ));
                }
                Op::Text {
                    text,
                    at,
                    offset,
                    size,
                    angle,
                    paint,
                } => {
                    out.push_str(&format!(
                        "gsave {} setrgbcolor /Helvetica findfont {:.1} scalefont setfont {:.2} {:.2} translate {:.1} rotate {:.2} {:.2} moveto ({}) show grestore\n",
                        rgb(*paint),
                        size,
                        at.0,
                        at.1,
                        angle,
                        offset.0,
                        offset.1,
                        escape_string(text)
                    ));
                }
            }
        }

        if self.format == VectorFormat::Ps {
            out.push_str("showpage\n%%EOF\n");
        } else {
            out.push_str("%%EOF\n");
        }
        out
    }

    fn pdf_content(&self) -> String {
        let mut out = String::from("1 j 1 J\n");
        for op in &self.ops {
            match op {
                Op::Stroke {
                    points,
                    paint,
                    width,
                    closed,
                } => {
                    out.push_str(&format!("{} RG {:.2} w\n", rgb(*paint), width));
                    push_pdf_path(&mut out, points);
                    out.push_str(if *closed { "s\n" } else { "S\n" });
                }
                Op::Fill { points, paint } => {
                    out.push_str(&format!("{} rg\n", rgb(*paint)));
                    push_pdf_path(&mut out, points);
                    out.push_str("h f\n");
                }
                Op::Circle {
                    center,
                    radius,
                    paint,
                    width,
                    fill,
                } => {
                    if *fill {
                        out.push_str(&format!("{} rg\n", rgb(*paint)));
                    } else {
                        out.push_str(&format!("{} RG {:.2} w\n", rgb(*paint), width));
                    }
                    push_pdf_circle(&mut out, *center, *radius);
                    out.push_str(if *fill { "f\n" } else { "S\n" });
                }
                Op::Text {
                    text,
                    at,
                    offset,
                    size,
                    angle,
                    paint,
                } => {
                    let (sin, cos) = angle.to_radians().sin_cos();
                    out.push_str(&format!(
                        "q {} rg {:.4} {:.4} {:.4} {:.4} {:.2} {:.2} cm BT /F1 {:.1} Tf {:.2} {:.2} Td ({}) Tj ET Q\n",
                        rgb(*paint),
                        cos,
                        sin,
                        -sin,
                        cos,
                        at.0,
                        at.1,
                        size,
                        offset.0,
                        offset.1,
                        escape_string(text)
                    ));
                }
            }
        }
        out
    }

    fn pdf(&self) -> String {
        let (w, h) = self.size;
        let content = self.pdf_content();
        let objects = [
            String::from("<< /Type /Catalog /Pages 2 0 R >>"),
            String::from("<< /Type /Pages /Kids [3 0 R] /Count 1 >>"),
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {w} {h}] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >>"
            ),
            format!(
                "<< /Length {} >>\nstream\n{}\nendstream",
                content.len(),
                content
            ),
            String::from(
                "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
            ),
        ];

        let mut out = String::from("%PDF-1.4\n");
        let mut offsets = Vec::with_capacity(objects.len());
        for (idx, body) in objects.iter().enumerate() {
            offsets.push(out.len());
            out.push_str(&format!("{} 0 obj\n{}\nendobj\n", idx + 1, body));
        }
        let xref = out.len();
        out.push_str(&format!(
            "xref\n0 {}\n0000000000 65535 f \n",
            objects.len() + 1
        ));
        for offset in offsets {
            out.push_str(&format!("{offset:010} 00000 n \n"));
        }
        out.push_str(&format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        ));
        out
    }
}

impl DrawingBackend for VectorBackend {
    type ErrorType = io::Error;

    fn get_size(&self) -> (u32, u32) {
        self.size
    }

    fn ensure_prepared(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        Ok(())
    }

    fn present(&mut self) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        fs::write(&self.path, self.document()).map_err(DrawingErrorKind::DrawingError)
    }

    fn draw_pixel(
        &mut self,
        point: BackendCoord,
        color: BackendColor,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        if color.alpha == 0.0 {
            return Ok(());
        }
        let (x, y) = self.flip(point);
        self.ops.push(Op::Fill {
            points: vec![(x, y), (x + 1.0, y), (x + 1.0, y - 1.0), (x, y - 1.0)],
            paint: blend(&color),
        });
        Ok(())
    }

    fn draw_line<S: BackendStyle>(
        &mut self,
        from: BackendCoord,
        to: BackendCoord,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        self.draw_path([from, to], style)
    }

    fn draw_rect<S: BackendStyle>(
        &mut self,
        upper_left: BackendCoord,
        bottom_right: BackendCoord,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        let color = style.color();
        if color.alpha == 0.0 {
            return Ok(());
        }
        let (x0, y0) = self.flip(upper_left);
        let (x1, y1) = self.flip(bottom_right);
        let points = vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)];
        self.ops.push(if fill {
            Op::Fill {
                points,
                paint: blend(&color),
            }
        } else {
            Op::Stroke {
                points,
                paint: blend(&color),
                width: style.stroke_width() as f64,
                closed: true,
            }
        });
        Ok(())
    }

    fn draw_path<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        path: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        let color = style.color();
        if color.alpha == 0.0 {
            return Ok(());
        }
        let points: Vec<(f64, f64)> = path.into_iter().map(|p| self.flip(p)).collect();
        if points.len() < 2 {
            return Ok(());
        }
        self.ops.push(Op::Stroke {
            points,
            paint: blend(&color),
            width: style.stroke_width() as f64,
            closed: false,
        });
        Ok(())
    }

    fn draw_circle<S: BackendStyle>(
        &mut self,
        center: BackendCoord,
        radius: u32,
        style: &S,
        fill: bool,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        let color = style.color();
        if color.alpha == 0.0 {
            return Ok(());
        }
        self.ops.push(Op::Circle {
            center: self.flip(center),
            radius: radius as f64,
            paint: blend(&color),
            width: style.stroke_width() as f64,
            fill,
        });
        Ok(())
    }

    fn fill_polygon<S: BackendStyle, I: IntoIterator<Item = BackendCoord>>(
        &mut self,
        vert: I,
        style: &S,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        let color = style.color();
        if color.alpha == 0.0 {
            return Ok(());
        }
        let points: Vec<(f64, f64)> = vert.into_iter().map(|p| self.flip(p)).collect();
        if points.len() < 3 {
            return Ok(());
        }
        self.ops.push(Op::Fill {
            points,
            paint: blend(&color),
        });
        Ok(())
    }

    fn draw_text<TStyle: BackendTextStyle>(
        &mut self,
        text: &str,
        style: &TStyle,
        pos: BackendCoord,
    ) -> Result<(), DrawingErrorKind<Self::ErrorType>> {
        let color = style.color();
        if color.alpha == 0.0 || text.trim().is_empty() {
            return Ok(());
        }
        let size = style.size();
        let width = text_width(text, size);
        let anchor = style.anchor();
        let dx = match anchor.h_pos {
            text_anchor::HPos::Left => 0.0,
            text_anchor::HPos::Center => -width / 2.0,
            text_anchor::HPos::Right => -width,
        };
        // Baseline offset from the anchor, in the text's own y-up frame.
        let dy = match anchor.v_pos {
            text_anchor::VPos::Top => -0.8 * size,
            text_anchor::VPos::Center => -0.3 * size,
            text_anchor::VPos::Bottom => 0.2 * size,
        };
        let angle = match style.transform() {
            FontTransform::None => 0.0,
            FontTransform::Rotate90 => -90.0,
            FontTransform::Rotate180 => 180.0,
            FontTransform::Rotate270 => 90.0,
        };
        self.ops.push(Op::Text {
            text: text.to_string(),
            at: self.flip(pos),
            offset: (dx, dy),
            size,
            angle,
            paint: blend(&color),
        });
        Ok(())
    }

    fn estimate_text_size<TStyle: BackendTextStyle>(
        &self,
        text: &str,
        style: &TStyle,
    ) -> Result<(u32, u32), DrawingErrorKind<Self::ErrorType>> {
        let size = style.size();
        Ok((text_width(text, size).ceil() as u32, size.ceil() as u32))
    }
}

/// Neither output supports transparency, so translucent colours are
/// composited over a white page.
fn blend(color: &BackendColor) -> Paint {
    let alpha = color.alpha.clamp(0.0, 1.0);
    let mix = |c: u8| (c as f64 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
    (mix(color.rgb.0), mix(color.rgb.1), mix(color.rgb.2))
}

fn text_width(text: &str, size: f64) -> f64 {
    text.chars().count() as f64 * size * GLYPH_WIDTH
}

fn rgb((r, g, b): Paint) -> String {
    format!(
        "{:.3} {:.3} {:.3}",
        r as f64 / 255.0,
        g as f64 / 255.0,
        b as f64 / 255.0
    )
}

fn push_ps_path(out: &mut String, points: &[(f64, f64)]) {
    for (idx, (x, y)) in points.iter().enumerate() {
        let op = if idx == 0 { "moveto" } else { "lineto" };
        out.push_str(&format!("{x:.2} {y:.2} {op} "));
    }
}

fn push_pdf_path(out: &mut String, points: &[(f64, f64)]) {
    for (idx, (x, y)) in points.iter().enumerate() {
        let op = if idx == 0 { "m" } else { "l" };
        out.push_str(&format!("{x:.2} {y:.2} {op} "));
    }
}

/// Four cubic Bezier quarter arcs.
fn push_pdf_circle(out: &mut String, (cx, cy): (f64, f64), r: f64) {
    let k = r * 4.0 * ((2.0f64).sqrt() - 1.0) / 3.0;
    out.push_str(&format!("{:.2} {:.2} m ", cx + r, cy));
    for quarter in 0..4 {
        let a0 = quarter as f64 * PI / 2.0;
        let a1 = a0 + PI / 2.0;
        let (s0, c0) = a0.sin_cos();
        let (s1, c1) = a1.sin_cos();
        out.push_str(&format!(
            "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c ",
            cx + r * c0 - k * s0,
            cy + r * s0 + k * c0,
            cx + r * c1 + k * s1,
            cy + r * s1 - k * c1,
            cx + r * c1,
            cy + r * s1
        ));
    }
}

/// Literal string for PS and PDF; characters outside ASCII become `?`.
fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotters::prelude::*;

    fn sketch(path: &Path, format: VectorFormat) {
        let root = VectorBackend::new(path, format, (200, 100)).into_drawing_area();
        root.fill(&WHITE).unwrap();
        root.draw(&PathElement::new(vec![(10, 10), (190, 90)], BLACK))
            .unwrap();
        root.draw(&Circle::new((50, 50), 5, RED.filled())).unwrap();
        root.draw(&Text::new("ratio (a)", (20, 20), ("sans-serif", 12)))
            .unwrap();
        root.present().unwrap();
    }

    #[test]
    fn pdf_has_a_consistent_xref() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sketch.pdf");
        sketch(&path, VectorFormat::Pdf);
        let pdf = fs::read_to_string(&path).unwrap();
        assert!(pdf.starts_with("%PDF-1.4\n"));
        assert!(pdf.ends_with("%%EOF\n"));
        assert!(pdf.contains("(ratio \\(a\\)) Tj"));

        let start = pdf.rfind("startxref\n").unwrap() + "startxref\n".len();
        let xref: usize = pdf[start..].lines().next().unwrap().parse().unwrap();
        assert!(pdf[xref..].starts_with("xref\n0 6\n"));
        let catalog = pdf[xref..].lines().nth(3).unwrap();
        let offset: usize = catalog[..10].parse().unwrap();
        assert!(pdf[offset..].starts_with("1 0 obj"));
    }

    #[test]
    fn postscript_flavours() {
        let dir = tempfile::tempdir().unwrap();
        let ps = dir.path().join("sketch.ps");
        let eps = dir.path().join("sketch.eps");
        sketch(&ps, VectorFormat::Ps);
        sketch(&eps, VectorFormat::Eps);
        let ps = fs::read_to_string(ps).unwrap();
        let eps = fs::read_to_string(eps).unwrap();
        assert!(ps.starts_with("%!PS-Adobe-3.0\n"));
        assert!(ps.contains("showpage"));
        assert!(eps.starts_with("%!PS-Adobe-3.0 EPSF-3.0\n"));
        assert!(!eps.contains("showpage"));
        assert!(eps.contains("%%BoundingBox: 0 0 200 100"));
        assert!(eps.contains("0 360 arc fill"));
    }

    #[test]
    fn translucent_strokes_are_lightened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.pdf");
        let root = VectorBackend::new(&path, VectorFormat::Pdf, (100, 100)).into_drawing_area();
        root.draw(&PathElement::new(vec![(0, 50), (100, 50)], BLACK.mix(0.05)))
            .unwrap();
        root.draw(&PathElement::new(vec![(50, 0), (50, 100)], BLACK))
            .unwrap();
        root.present().unwrap();
        let pdf = fs::read_to_string(&path).unwrap();
        assert!(pdf.contains("0.949 0.949 0.949 RG"));
        assert_eq!(pdf.matches("0.000 0.000 0.000 RG").count(), 1);
    }

    #[test]
    fn blend_composites_over_white() {
        let half = BackendColor {
            alpha: 0.5,
            rgb: (0, 0, 255),
        };
        assert_eq!(blend(&half), (128, 128, 255));
        let solid = BackendColor {
            alpha: 1.0,
            rgb: (10, 20, 30),
        };
        assert_eq!(blend(&solid), (10, 20, 30));
    }

    #[test]
    fn y_axis_points_up() {
        let backend = VectorBackend::new(Path::new("unused.pdf"), VectorFormat::Pdf, (200, 100));
        assert_eq!(backend.flip((10, 0)), (10.0, 100.0));
        assert_eq!(backend.flip((10, 100)), (10.0, 0.0));
    }

    #[test]
    fn escapes_string_delimiters() {
        assert_eq!(escape_string("a(b)\\c"), "a\\(b\\)\\\\c");
        assert_eq!(escape_string("τ ≤ 2"), "? ? 2");
    }
}

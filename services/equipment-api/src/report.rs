//! PDF report for a single dataset.
//!
//! Writes a small PDF 1.4 document by hand: US Letter pages, the three base
//! Helvetica faces, uncompressed content streams. Layout: title, dataset
//! metadata, summary statistics table, type distribution table and the first
//! [`MAX_EQUIPMENT_ROWS`] equipment rows.

use std::fmt::Write as _;

use chrono::NaiveDate;
use equipment_core::FullView;
use uuid::Uuid;

pub const MAX_EQUIPMENT_ROWS: usize = 20;

const PAGE_W: f32 = 612.0;
const PAGE_H: f32 = 792.0;
const MARGIN: f32 = 72.0;
const INCH: f32 = 72.0;

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    fn resource(self) -> &'static str {
        match self {
            Font::Regular => "/F1",
            Font::Bold => "/F2",
            Font::Italic => "/F3",
        }
    }
}

type Rgb = (f32, f32, f32);
const GREY: Rgb = (0.5, 0.5, 0.5);
const WHITESMOKE: Rgb = (0.96, 0.96, 0.96);
const BEIGE: Rgb = (0.96, 0.96, 0.86);
const BLACK: Rgb = (0.0, 0.0, 0.0);

struct TableStyle {
    col_widths: Vec<f32>,
    header_size: f32,
    body_size: f32,
    header_bottom_padding: f32,
}

/// Top-down page layout; `y` is the baseline cursor in PDF user space.
struct Layout {
    pages: Vec<String>,
    current: String,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self { pages: Vec::new(), current: String::new(), y: PAGE_H - MARGIN }
    }

    fn new_page(&mut self) {
        let done = std::mem::take(&mut self.current);
        self.pages.push(done);
        self.y = PAGE_H - MARGIN;
    }

    fn ensure_room(&mut self, height: f32) {
        if self.y - height < MARGIN && self.y < PAGE_H - MARGIN {
            self.new_page();
        }
    }

    fn space(&mut self, height: f32) {
        self.y -= height;
    }

    fn text(&mut self, font: Font, size: f32, x: f32, y: f32, s: &str) {
        let _ = writeln!(
            self.current,
            "BT {} {size} Tf {x:.2} {y:.2} Td ({}) Tj ET",
            font.resource(),
            escape(s)
        );
    }

    fn fill_color(&mut self, (r, g, b): Rgb) {
        let _ = writeln!(self.current, "{r} {g} {b} rg");
    }

    fn rect_fill(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb) {
        self.fill_color(color);
        let _ = writeln!(self.current, "{x:.2} {y:.2} {w:.2} {h:.2} re f");
    }

    fn rect_stroke(&mut self, x: f32, y: f32, w: f32, h: f32) {
        let (r, g, b) = BLACK;
        let _ = writeln!(self.current, "{r} {g} {b} RG 1 w {x:.2} {y:.2} {w:.2} {h:.2} re S");
    }

    fn centered_line(&mut self, font: Font, size: f32, s: &str) {
        self.ensure_room(size * 1.2);
        self.y -= size;
        let x = (PAGE_W - text_width(font, s, size)) / 2.0;
        self.fill_color(BLACK);
        self.text(font, size, x, self.y, s);
        self.y -= size * 0.2;
    }

    fn heading(&mut self, s: &str) {
        self.ensure_room(14.0 * 1.2 + 40.0);
        self.y -= 14.0;
        self.fill_color(BLACK);
        self.text(Font::Bold, 14.0, MARGIN, self.y, s);
        self.y -= 14.0 * 0.2;
    }

    /// "Label: value" line with a bold label.
    fn field(&mut self, label: &str, value: &str) {
        let size = 10.0;
        self.ensure_room(size * 1.2);
        self.y -= size;
        self.fill_color(BLACK);
        let label = format!("{label}: ");
        self.text(Font::Bold, size, MARGIN, self.y, &label);
        self.text(Font::Regular, size, MARGIN + text_width(Font::Bold, &label, size), self.y, value);
        self.y -= size * 0.2;
    }

    fn note(&mut self, s: &str) {
        let size = 10.0;
        self.ensure_room(size * 1.2);
        self.y -= size;
        self.fill_color(BLACK);
        self.text(Font::Italic, size, MARGIN, self.y, s);
        self.y -= size * 0.2;
    }

    /// Centered grid table; the first row is the header.
    fn table(&mut self, rows: &[Vec<String>], style: &TableStyle) {
        let total_w: f32 = style.col_widths.iter().sum();
        let left = (PAGE_W - total_w) / 2.0;

        for (i, row) in rows.iter().enumerate() {
            let is_header = i == 0;
            let (size, font, fill, ink) = if is_header {
                (style.header_size, Font::Bold, GREY, WHITESMOKE)
            } else {
                (style.body_size, Font::Regular, BEIGE, BLACK)
            };
            let bottom_pad = if is_header { style.header_bottom_padding } else { 3.0 };
            let height = size * 1.2 + 3.0 + bottom_pad;

            self.ensure_room(height);
            let top = self.y;
            let bottom = top - height;

            let mut x = left;
            for (col, w) in style.col_widths.iter().enumerate() {
                self.rect_fill(x, bottom, *w, height, fill);
                let cell = row.get(col).map(String::as_str).unwrap_or("");
                let tx = x + (w - text_width(font, cell, size)) / 2.0;
                self.fill_color(ink);
                self.text(font, size, tx, bottom + bottom_pad + size * 0.2, cell);
                self.rect_stroke(x, bottom, *w, height);
                x += w;
            }
            self.y = bottom;
        }
    }

    fn finish(mut self) -> Vec<String> {
        if !self.current.is_empty() || self.pages.is_empty() {
            self.new_page();
        }
        self.pages
    }
}

// Helvetica advance widths (1/1000 em) for ' '..='~', from the standard AFM files.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

#[rustfmt::skip]
const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611,
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556,
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611,
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584,
];

/// Advance width in points. Characters outside ASCII use the width of a digit.
fn text_width(font: Font, s: &str, size: f32) -> f32 {
    let table = match font {
        Font::Bold => &HELVETICA_BOLD_WIDTHS,
        Font::Regular | Font::Italic => &HELVETICA_WIDTHS,
    };
    let units: u32 = s
        .chars()
        .map(|c| match c {
            ' '..='~' => u32::from(table[c as usize - 0x20]),
            _ => 556,
        })
        .sum();
    units as f32 * size / 1000.0
}

/// WinAnsiEncoding code for characters outside Latin-1 that the base fonts carry.
fn win_ansi_extra(c: char) -> Option<u8> {
    let code = match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8a,
        '‹' => 0x8b,
        'Œ' => 0x8c,
        'Ž' => 0x8e,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9a,
        '›' => 0x9b,
        'œ' => 0x9c,
        'ž' => 0x9e,
        'Ÿ' => 0x9f,
        _ => return None,
    };
    Some(code)
}

/// PDF literal string body in WinAnsiEncoding. Bytes above ASCII are written
/// as octal escapes; characters the standard fonts have no glyph for become '?'.
fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            ' '..='~' => out.push(c),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(out, "\\{:03o}", c as u32);
            }
            _ => match win_ansi_extra(c) {
                Some(code) => {
                    let _ = write!(out, "\\{code:03o}");
                }
                None => out.push('?'),
            },
        }
    }
    out
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

pub fn report_filename(id: Uuid, date: NaiveDate) -> String {
    format!("report_{id}_{}.pdf", date.format("%Y%m%d"))
}

pub fn render_pdf(view: &FullView) -> Vec<u8> {
    let s = &view.summary;
    let mut layout = Layout::new();

    layout.centered_line(Font::Bold, 18.0, "Equipment Data Report");
    layout.space(0.3 * INCH);

    layout.field("Dataset", &s.name);
    layout.field("Uploaded", &s.uploaded_at.format("%Y-%m-%d %H:%M:%S").to_string());
    layout.field("Uploaded by", &s.uploaded_by_username);
    layout.field("Total Equipment", &s.total_count.to_string());
    layout.space(0.3 * INCH);

    let two_col = TableStyle {
        col_widths: vec![3.0 * INCH, 2.0 * INCH],
        header_size: 12.0,
        body_size: 10.0,
        header_bottom_padding: 12.0,
    };

    layout.heading("Summary Statistics");
    layout.space(0.1 * INCH);
    let summary_rows = vec![
        vec!["Metric".to_string(), "Average Value".to_string()],
        vec!["Flowrate".to_string(), format!("{:.2}", s.avg_flowrate)],
        vec!["Pressure".to_string(), format!("{:.2}", s.avg_pressure)],
        vec!["Temperature".to_string(), format!("{:.2}", s.avg_temperature)],
    ];
    layout.table(&summary_rows, &two_col);
    layout.space(0.3 * INCH);

    layout.heading("Equipment Type Distribution");
    layout.space(0.1 * INCH);
    let mut dist_rows = vec![vec!["Equipment Type".to_string(), "Count".to_string()]];
    dist_rows.extend(s.type_distribution.iter().map(|(label, count)| vec![label.to_string(), count.to_string()]));
    layout.table(&dist_rows, &two_col);
    layout.space(0.3 * INCH);

    layout.heading("Equipment Details");
    layout.space(0.1 * INCH);
    let mut eq_rows: Vec<Vec<String>> = vec![["Name", "Type", "Flow", "Press", "Temp"].iter().map(|h| h.to_string()).collect()];
    eq_rows.extend(view.equipment.iter().take(MAX_EQUIPMENT_ROWS).map(|eq| {
        vec![
            truncate(&eq.equipment_name, 20),
            truncate(&eq.equipment_type, 15),
            format!("{:.1}", eq.flowrate),
            format!("{:.1}", eq.pressure),
            format!("{:.1}", eq.temperature),
        ]
    }));
    layout.table(
        &eq_rows,
        &TableStyle {
            col_widths: vec![2.0 * INCH, 1.5 * INCH, 0.8 * INCH, 0.8 * INCH, 0.8 * INCH],
            header_size: 8.0,
            body_size: 8.0,
            header_bottom_padding: 8.0,
        },
    );

    if s.total_count > MAX_EQUIPMENT_ROWS as u64 {
        layout.space(0.1 * INCH);
        layout.note(&format!(
            "Note: Showing first {MAX_EQUIPMENT_ROWS} of {} equipment items",
            s.total_count
        ));
    }

    write_document(&layout.finish(), &s.name)
}

/// Serialize page content streams into a complete PDF file.
fn write_document(pages: &[String], title: &str) -> Vec<u8> {
    // 1 catalog, 2 page tree, 3-5 fonts, 6 info, then (page, content) pairs
    const FIRST_PAGE_OBJ: usize = 7;
    let page_obj = |i: usize| FIRST_PAGE_OBJ + 2 * i;

    let mut objects: Vec<String> = Vec::new();
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());

    let kids: Vec<String> = (0..pages.len()).map(|i| format!("{} 0 R", page_obj(i))).collect();
    objects.push(format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), pages.len()));

    for base in ["Helvetica", "Helvetica-Bold", "Helvetica-Oblique"] {
        objects.push(format!(
            "<< /Type /Font /Subtype /Type1 /BaseFont /{base} /Encoding /WinAnsiEncoding >>"
        ));
    }
    objects.push(format!(
        "<< /Title ({}) /Producer (equipment-api) >>",
        escape(&format!("Equipment Data Report - {title}"))
    ));

    for (i, content) in pages.iter().enumerate() {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_W} {PAGE_H}] \
             /Resources << /Font << /F1 3 0 R /F2 4 0 R /F3 5 0 R >> >> /Contents {} 0 R >>",
            page_obj(i) + 1
        ));
        objects.push(format!("<< /Length {} >>\nstream\n{content}endstream", content.len()));
    }

    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", i + 1).as_bytes());
    }

    let xref_at = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for off in &offsets {
        let _ = write!(xref, "{off:010} 00000 n \n");
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root 1 0 R /Info 6 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    );
    out.extend_from_slice(xref.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use equipment_core::{BriefView, Distribution, EquipmentView};

    fn view(rows: usize, types: usize) -> FullView {
        let mut distribution = Distribution::new();
        let equipment: Vec<EquipmentView> = (0..rows)
            .map(|i| {
                let t = format!("Type-{}", i % types.max(1));
                distribution.increment(&t);
                EquipmentView {
                    id: i as u32,
                    equipment_name: format!("Equipment number {i} with a long name"),
                    equipment_type: t,
                    flowrate: i as f64,
                    pressure: i as f64 + 0.5,
                    temperature: 3.0,
                }
            })
            .collect();
        FullView {
            summary: BriefView {
                id: Uuid::new_v4(),
                name: "plant (north).csv".into(),
                uploaded_at: Utc::now(),
                uploaded_by: "demo".into(),
                uploaded_by_username: "demo".into(),
                total_count: rows as u64,
                avg_flowrate: 1.0,
                avg_pressure: 2.0,
                avg_temperature: 3.0,
                type_distribution: distribution,
                source_hash: String::new(),
            },
            equipment,
        }
    }

    fn as_text(pdf: &[u8]) -> String {
        String::from_utf8_lossy(pdf).into_owned()
    }

    #[test]
    fn renders_a_well_formed_document() {
        let pdf = render_pdf(&view(3, 2));
        let text = as_text(&pdf);
        assert!(pdf.starts_with(b"%PDF-1.4"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("(Equipment Data Report) Tj"));
        assert!(text.contains("(Summary Statistics) Tj"));
        assert!(text.contains("(Equipment Type Distribution) Tj"));
        assert!(text.contains("(plant \\(north\\).csv) Tj"));
        assert!(!text.contains("Showing first"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let pdf = render_pdf(&view(2, 1));
        let text = as_text(&pdf);
        let xref_at: usize = text
            .rsplit("startxref\n")
            .next()
            .and_then(|tail| tail.lines().next())
            .and_then(|n| n.parse().ok())
            .unwrap();
        assert!(pdf[xref_at..].starts_with(b"xref\n"));

        let table = as_text(&pdf[xref_at..]);
        let first_entry = table.lines().nth(3).unwrap();
        let off: usize = first_entry[..10].parse().unwrap();
        assert!(pdf[off..].starts_with(b"1 0 obj"));
    }

    #[test]
    fn caps_equipment_listing_with_note() {
        let text = as_text(&render_pdf(&view(25, 3)));
        assert!(text.contains("Note: Showing first 20 of 25 equipment items"));
        assert!(text.contains("(Equipment number 1 w) Tj"));
        assert!(!text.contains("Equipment number 20"));
        assert!(text.contains("(19.0) Tj"));
        assert!(!text.contains("(20.0) Tj"));
    }

    #[test]
    fn long_tables_break_across_pages() {
        let text = as_text(&render_pdf(&view(60, 60)));
        assert!(!text.contains("/Count 1 >>"));
    }

    #[test]
    fn escape_handles_delimiters_and_latin1() {
        assert_eq!(escape("a(b)c\\"), "a\\(b\\)c\\\\");
        assert_eq!(escape("°C"), "\\260C");
        assert_eq!(escape("泵"), "?");
    }

    #[test]
    fn escape_maps_win_ansi_punctuation() {
        assert_eq!(escape("10–20 €"), "10\\22620 \\200");
        assert_eq!(escape("“Main” Pump™"), "\\223Main\\224 Pump\\231");
    }

    #[test]
    fn widths_follow_font_metrics() {
        // E q u i p m e n t = 667+556+556+222+556+833+556+556+278
        assert!((text_width(Font::Regular, "Equipment", 10.0) - 47.8).abs() < 1e-3);
        assert!((text_width(Font::Italic, "Equipment", 10.0) - 47.8).abs() < 1e-3);
        // bold: 667+611+611+278+611+889+556+611+333
        assert!((text_width(Font::Bold, "Equipment", 10.0) - 51.67).abs() < 1e-3);
        assert!(text_width(Font::Regular, "iiii", 12.0) < text_width(Font::Regular, "WWWW", 12.0));
    }

    #[test]
    fn filename_uses_id_and_date() {
        let id = Uuid::nil();
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(report_filename(id, date), format!("report_{id}_20240309.pdf"));
    }
}

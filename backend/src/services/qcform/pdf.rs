//! QC report rendering with genpdf.
//!
//! The report is first flattened into [`Block`]s, which is what the tests
//! look at; turning blocks into PDF elements needs the font files.

use super::questions::{self, DateKind, Question, N_DATE_SLOTS, SECTIONS};
use crate::config::PdfConfig;
use crate::error::{PortalError, Result};
use genpdf::elements::{Break, LinearLayout, Paragraph};
use genpdf::style::{Style, StyledString};
use genpdf::Document;
use tccon_common::model::qc::QcReport;
use tccon_common::sites::site_name;

const FALLBACK_FONT: &str = "LiberationSans";
const BODY_FONT_SIZE: u8 = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Title(String),
    Heading(String),
    Subheading(String),
    Text(String),
    Labeled(String, String),
    Bullet(String),
    Gap,
}

/// `YYYY-MM-DD to YYYY-MM-DD`, with `beginning`/`end` for an open side.
/// `None` when neither side was given.
pub fn format_date_range(start: Option<&str>, end: Option<&str>) -> Option<String> {
    if start.is_none() && end.is_none() {
        return None;
    }
    Some(format!("{} to {}", start.unwrap_or("beginning"), end.unwrap_or("end")))
}

fn question_dates(report: &QcReport, question: &Question) -> Vec<String> {
    (0..N_DATE_SLOTS)
        .filter_map(|i| match question.date_fields(i)? {
            (field, None) => report.answer(&field).map(str::to_string),
            (start, Some(end)) => format_date_range(report.answer(&start), report.answer(&end)),
        })
        .collect()
}

fn question_blocks(report: &QcReport, question: &Question, blocks: &mut Vec<Block>) {
    if !question.title.is_empty() {
        blocks.push(Block::Subheading(question.title.to_string()));
    }
    for mc in question.mcs {
        let answer = report
            .answer(mc.field)
            .map(|code| mc.label_for(code).unwrap_or(code).to_string())
            .unwrap_or_else(|| "(no answer)".to_string());
        blocks.push(Block::Labeled(mc.label.to_string(), answer));
    }
    if question.dates != DateKind::None {
        let dates = question_dates(report, question);
        if !dates.is_empty() {
            let label = if question.dates == DateKind::Paired { "Date ranges" } else { "Dates" };
            blocks.push(Block::Text(format!("{}:", label)));
            blocks.extend(dates.into_iter().map(Block::Bullet));
        }
    }
    if let Some(comments) = report.answer(&question.comments_field()) {
        blocks.push(Block::Labeled(question.comments_label.to_string(), comments.to_string()));
    }
    blocks.push(Block::Gap);
}

pub fn report_blocks(report: &QcReport) -> Vec<Block> {
    let site = match site_name(&report.site) {
        Some(name) => format!("{} ({})", name, report.site),
        None => report.site.clone(),
    };
    let mut blocks = vec![
        Block::Title(format!("TCCON QC report: {}", site)),
        Block::Labeled("Reviewer".into(), report.reviewer.clone()),
        Block::Labeled("NetCDF files".into(), report.netcdf_files.clone()),
    ];
    if report.is_draft {
        blocks.push(Block::Text("DRAFT: this report has not been submitted.".into()));
    }
    if let Some(time) = report.modification_time {
        blocks.push(Block::Labeled("Last modified".into(), time.format("%Y-%m-%d %H:%M UTC").to_string()));
    }
    blocks.push(Block::Gap);

    for section in SECTIONS {
        blocks.push(Block::Heading(section.name.to_string()));
        for question in section.questions {
            question_blocks(report, question, &mut blocks);
        }
    }
    blocks
}

fn load_font(config: &PdfConfig) -> Result<genpdf::fonts::FontFamily<genpdf::fonts::FontData>> {
    if let Ok(family) = genpdf::fonts::from_files(&config.font_dir, &config.font_family, None) {
        return Ok(family);
    }
    log::warn!(
        "Font family {} not found in {}, trying {}",
        config.font_family,
        config.font_dir.display(),
        FALLBACK_FONT
    );
    genpdf::fonts::from_files(&config.font_dir, FALLBACK_FONT, None)
        .map_err(|e| PortalError::Pdf(format!("cannot load fonts from {}: {}", config.font_dir.display(), e)))
}

fn configure_document(config: &PdfConfig, title: &str) -> Result<Document> {
    let mut doc = Document::new(load_font(config)?);
    doc.set_title(title);
    doc.set_font_size(BODY_FONT_SIZE);
    doc.set_line_spacing(1.1);
    let mut decorator = genpdf::SimplePageDecorator::new();
    decorator.set_margins(15);
    doc.set_page_decorator(decorator);
    Ok(doc)
}

fn push_block(doc: &mut Document, block: Block) {
    match block {
        Block::Title(text) => doc.push(Paragraph::new(StyledString::new(
            text,
            Style::new().bold().with_font_size(16),
        ))),
        Block::Heading(text) => {
            doc.push(Break::new(1));
            doc.push(Paragraph::new(StyledString::new(
                text,
                Style::new().bold().with_font_size(13),
            )));
        }
        Block::Subheading(text) => doc.push(Paragraph::new(StyledString::new(text, Style::new().bold()))),
        Block::Text(text) => doc.push(Paragraph::new(text)),
        Block::Labeled(label, value) => {
            let mut p = Paragraph::new(StyledString::new(format!("{}: ", label), Style::new().italic()));
            p.push(StyledString::new(value, Style::new()));
            doc.push(p);
        }
        Block::Bullet(text) => {
            let mut layout = LinearLayout::vertical();
            layout.push(Paragraph::new(format!("• {}", text)));
            doc.push(layout);
        }
        Block::Gap => doc.push(Break::new(1)),
    }
}

/// Renders `report` to PDF bytes.
pub fn render_pdf(report: &QcReport, config: &PdfConfig) -> Result<Vec<u8>> {
    let title = format!("QC report {}", report.id.map(|i| i.to_string()).unwrap_or_default());
    let mut doc = configure_document(config, &title)?;
    for block in report_blocks(report) {
        push_block(&mut doc, block);
    }
    let mut bytes = Vec::new();
    doc.render(&mut bytes)
        .map_err(|e| PortalError::Pdf(e.to_string()))?;
    Ok(bytes)
}

/// File name offered for download.
pub fn pdf_file_name(report: &QcReport) -> String {
    format!("qc_report_{}_{}.pdf", report.site, report.id.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn report() -> QcReport {
        QcReport {
            id: Some(7),
            reviewer: "Josh L".into(),
            site: "pa".into(),
            netcdf_files: "pa.nc".into(),
            is_draft: false,
            answers: BTreeMap::from([
                ("timing_present".to_string(), "y".to_string()),
                ("timing_when0s".to_string(), "2020-01-01".to_string()),
                ("timing_when0e".to_string(), "2020-02-01".to_string()),
                ("timing_when1e".to_string(), "2021-03-01".to_string()),
                ("hcl_vsf_when2".to_string(), "2019-05-05".to_string()),
                ("lse_present".to_string(), "0".to_string()),
                ("additional_cmts".to_string(), "Thanks!".to_string()),
            ]),
            modification_time: None,
        }
    }

    #[test]
    fn open_date_ranges() {
        assert_eq!(format_date_range(None, Some("2020-01-01")).as_deref(), Some("beginning to 2020-01-01"));
        assert_eq!(format_date_range(Some("2020-01-01"), None).as_deref(), Some("2020-01-01 to end"));
        assert_eq!(format_date_range(None, None), None);
    }

    #[test]
    fn blocks_follow_sections_and_answers() {
        let blocks = report_blocks(&report());
        assert_eq!(blocks[0], Block::Title("TCCON QC report: Park Falls (pa)".into()));

        let headings: Vec<&Block> = blocks.iter().filter(|b| matches!(b, Block::Heading(_))).collect();
        assert_eq!(headings.len(), SECTIONS.len());

        assert!(blocks.contains(&Block::Labeled("Is timing error present".into(), "Yes".into())));
        assert!(blocks.contains(&Block::Labeled("LSE status".into(), "Uniformly 0".into())));
        assert!(blocks.contains(&Block::Labeled("Requires reprocessing".into(), "(no answer)".into())));
        assert!(blocks.contains(&Block::Bullet("2020-01-01 to 2020-02-01".into())));
        assert!(blocks.contains(&Block::Bullet("beginning to 2021-03-01".into())));
        assert!(blocks.contains(&Block::Bullet("2019-05-05".into())));
        assert!(blocks.contains(&Block::Labeled("Additional comments".into(), "Thanks!".into())));
        assert!(!blocks.iter().any(|b| matches!(b, Block::Text(t) if t.starts_with("DRAFT"))));
        assert_eq!(questions::questions().count(), 11);
    }

    #[test]
    fn missing_fonts_are_a_pdf_error() {
        let config = PdfConfig {
            font_dir: "/nonexistent/fonts".into(),
            font_family: "Nope".into(),
        };
        let err = render_pdf(&report(), &config).unwrap_err();
        assert!(matches!(err, PortalError::Pdf(_)));
        assert_eq!(pdf_file_name(&report()), "qc_report_pa_7.pdf");
    }

    /// Runs the genpdf layout when a font family is available. The font
    /// directory comes from `TCCON_TEST_FONT_DIR` and defaults to the one in
    /// [`PdfConfig::default`]; without fonts the test returns early.
    #[test]
    fn renders_pdf_when_fonts_are_installed() {
        let mut config = PdfConfig::default();
        if let Some(dir) = std::env::var_os("TCCON_TEST_FONT_DIR") {
            config.font_dir = dir.into();
        }
        if load_font(&config).is_err() {
            eprintln!("skipping PDF layout test, no fonts in {}", config.font_dir.display());
            return;
        }

        let mut draft = report();
        draft.is_draft = true;
        let blocks = report_blocks(&draft);
        assert!(blocks.iter().any(|b| matches!(b, Block::Text(_))));
        assert!(blocks.iter().any(|b| matches!(b, Block::Subheading(_))));
        assert!(blocks.contains(&Block::Gap));

        let bytes = render_pdf(&draft, &config).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}

//! End-to-end export tests over JSON document trees.

use mmd_export::{Error, ExportOptions, Extensions, Format, export_json};

fn export(json: &str, format: Format) -> String {
    export_json(json, &ExportOptions::new(format)).unwrap()
}

// ============================================================================
// Footnotes and References
// ============================================================================

const FOOTNOTE_DOC: &str = r#"[
    {"kind": "para", "children": [
        {"kind": "str", "text": "Text"},
        {"kind": "note_reference", "text": "a"}
    ]},
    {"kind": "note_source", "text": "a", "children": [
        {"kind": "para", "children": [{"kind": "str", "text": "Note."}]}
    ]}
]"#;

#[test]
fn test_html_footnote_and_endnotes() {
    assert_eq!(
        export(FOOTNOTE_DOC, Format::Html),
        "<p>Text<a href=\"#fn:1\" id=\"fnref:1\" title=\"see footnote\" class=\"footnote\">[1]</a></p>\n\n\
         <div class=\"footnotes\">\n<hr />\n<ol>\n\
         <li id=\"fn:1\">\n\
         <p>Note. <a href=\"#fnref:1\" title=\"return to article\" class=\"reversefootnote\">&#160;&#8617;</a></p>\n\
         </li>\n</ol>\n</div>\n"
    );
}

#[test]
fn test_notes_numbered_by_first_reference() {
    let json = r#"[
        {"kind": "para", "children": [
            {"kind": "note_reference", "text": "second"},
            {"kind": "note_reference", "text": "first"},
            {"kind": "note_reference", "text": "second"}
        ]},
        {"kind": "note_source", "text": "first", "children": [
            {"kind": "para", "children": [{"kind": "str", "text": "One"}]}
        ]},
        {"kind": "note_source", "text": "second", "children": [
            {"kind": "para", "children": [{"kind": "str", "text": "Two"}]}
        ]},
        {"kind": "note_source", "text": "unused", "children": [
            {"kind": "para", "children": [{"kind": "str", "text": "Never"}]}
        ]}
    ]"#;
    let html = export(json, Format::Html);

    // The repeat reference carries no id
    assert_eq!(html.matches("id=\"fnref:1\"").count(), 1);
    assert_eq!(html.matches("href=\"#fn:1\"").count(), 2);

    let two = html.find("<li id=\"fn:1\">\n<p>Two").unwrap();
    let one = html.find("<li id=\"fn:2\">\n<p>One").unwrap();
    assert!(two < one);
    assert!(!html.contains("Never"));
}

#[test]
fn test_inline_footnote() {
    let json = r#"[
        {"kind": "para", "children": [
            {"kind": "str", "text": "Inline"},
            {"kind": "note_reference", "children": [{"kind": "str", "text": "body"}]}
        ]}
    ]"#;
    let html = export(json, Format::Html);
    assert!(html.contains("<li id=\"fn:1\">\n<p>body <a href=\"#fnref:1\""));
}

#[test]
fn test_no_endnotes_without_references() {
    let json = r#"[{"kind": "para", "children": [{"kind": "str", "text": "Plain"}]}]"#;
    assert_eq!(export(json, Format::Html), "<p>Plain</p>");
}

#[test]
fn test_undefined_reference_renders_literally() {
    let json = r##"[
        {"kind": "para", "children": [
            {"kind": "link", "link": {"label": "#undefined-label"}, "children": [
                {"kind": "str", "text": "See"}
            ]}
        ]}
    ]"##;
    assert_eq!(export(json, Format::Html), "<p>[See][#undefined-label]</p>");
}

#[test]
fn test_heading_cross_reference() {
    let json = r#"[
        {"kind": "h1", "children": [{"kind": "str", "text": "Getting Started"}]},
        {"kind": "para", "children": [
            {"kind": "link", "link": {"label": "Getting Started"}, "children": [
                {"kind": "str", "text": "back"}
            ]}
        ]}
    ]"#;
    assert_eq!(
        export(json, Format::Html),
        "<h1 id=\"getting-started\">Getting Started</h1>\n\n\
         <p><a href=\"#getting-started\">back</a></p>"
    );
}

#[test]
fn test_abbreviation_markup() {
    let json = r#"[
        {"kind": "abbreviation", "text": "HTML", "children": [
            {"kind": "str", "text": "Markup"}
        ]},
        {"kind": "para", "children": [
            {"kind": "str", "text": "Use"},
            {"kind": "space", "text": " "},
            {"kind": "str", "text": "Markup"}
        ]}
    ]"#;
    assert_eq!(
        export(json, Format::Html),
        "<p>Use <abbr title=\"Markup\">HTML</abbr></p>"
    );
}

const SPAN_DOC: &str = r#"[
    {"kind": "abbreviation", "text": "HTML", "children": [
        {"kind": "str", "text": "HyperText"},
        {"kind": "space", "text": " "},
        {"kind": "str", "text": "Markup"},
        {"kind": "space", "text": " "},
        {"kind": "str", "text": "Language"}
    ]},
    {"kind": "para", "children": [
        {"kind": "str", "text": "Learn"},
        {"kind": "space", "text": " "},
        {"kind": "str", "text": "HyperText"},
        {"kind": "space", "text": " "},
        {"kind": "str", "text": "Markup"},
        {"kind": "space", "text": " "},
        {"kind": "str", "text": "Language"},
        {"kind": "space", "text": " "},
        {"kind": "str", "text": "today"}
    ]}
]"#;

#[test]
fn test_abbreviation_span_in_every_format() {
    assert_eq!(
        export(SPAN_DOC, Format::Html),
        "<p>Learn <abbr title=\"HyperText Markup Language\">HTML</abbr> today</p>"
    );
    assert!(export(SPAN_DOC, Format::Odf)
        .contains("<text:p text:style-name=\"Standard\">Learn HyperText Markup Language today</text:p>"));
    assert!(export(SPAN_DOC, Format::Rtf).contains("\\pard Learn HyperText Markup Language today\\par"));
    assert!(export(SPAN_DOC, Format::Text).contains("Learn HyperText Markup Language today"));

    let latex = export(SPAN_DOC, Format::Latex);
    assert!(latex.contains("Learn \\ac{"));
    assert!(latex.contains("} today"));
    assert!(!latex.contains("Markup Language today"));

    let lyx = export(SPAN_DOC, Format::Lyx);
    assert!(lyx.contains(
        "\n\\begin_layout Standard\nLearn HyperText Markup Language (HTML)\n\
         \\begin_inset CommandInset nomenclature\nLatexCommand nomenclature\nsymbol \"HTML\"\n"
    ));
    assert!(lyx.contains("\\end_inset\n today\n\\end_layout\n"));
    assert!(lyx.contains("LatexCommand printnomenclature"));
}

#[test]
fn test_glossary_reference_class() {
    let json = r#"[
        {"kind": "para", "children": [
            {"kind": "str", "text": "See"},
            {"kind": "note_reference", "text": "term"}
        ]},
        {"kind": "glossary_source", "text": "term", "children": [
            {"kind": "glossary_term", "children": [{"kind": "str", "text": "Term"}]},
            {"kind": "para", "children": [{"kind": "str", "text": "Meaning."}]}
        ]}
    ]"#;
    assert!(export(json, Format::Html).starts_with(
        "<p>See<a href=\"#fn:1\" id=\"fnref:1\" title=\"see footnote\" class=\"footnote glossary\">[1]</a></p>"
    ));
}

// ============================================================================
// Citations
// ============================================================================

const CITATION_DOC: &str = r#"[
    {"kind": "para", "children": [
        {"kind": "str", "text": "See"},
        {"kind": "citation", "link": {"label": "doe"}, "children": [
            {"kind": "str", "text": "p. 4"}
        ]}
    ]},
    {"kind": "note_source", "text": "doe", "children": [
        {"kind": "para", "children": [{"kind": "str", "text": "Doe, 2006."}]}
    ]}
]"#;

#[test]
fn test_html_citation() {
    let html = export(CITATION_DOC, Format::Html);
    assert!(html.starts_with(
        "<p>See<a class=\"citation\" href=\"#fn:1\" title=\"Jump to citation\">\
         [<span class=\"locator\">p. 4</span>, 1]"
    ));
    assert!(html.contains("<li id=\"fn:1\" class=\"citation\">"));
    // Citations get no back-link
    assert!(!html.contains("reversefootnote"));
}

#[test]
fn test_external_citation_is_unresolved() {
    let json = r#"[
        {"kind": "para", "children": [
            {"kind": "citation", "link": {"label": "[#undefined-label]"}, "children": [
                {"kind": "str", "text": "See"}
            ]}
        ]}
    ]"#;
    assert_eq!(
        export(json, Format::Html),
        "<p><span class=\"externalcitation\">[See][#undefined-label]</span></p>"
    );
}

#[test]
fn test_latex_citation_and_bibliography() {
    let tex = export(CITATION_DOC, Format::Latex);
    assert!(tex.starts_with("See~\\citep[p. 4]{doe}"));
    assert!(tex.contains("\\begin{thebibliography}{0}\n\\bibitem{doe}\nDoe, 2006."));
    assert!(tex.ends_with("\\end{thebibliography}"));
}

// ============================================================================
// Other Formats
// ============================================================================

#[test]
fn test_latex_mode_switches_to_beamer() {
    let json = r#"[
        {"kind": "metadata", "children": [
            {"kind": "meta_key", "text": "LaTeX Mode", "children": [
                {"kind": "meta_value", "text": "beamer"}
            ]}
        ]},
        {"kind": "para", "children": [{"kind": "str", "text": "Slide text"}]}
    ]"#;
    let tex = export(json, Format::Latex);
    assert!(tex.contains("Slide text"));
    assert!(tex.contains("\\mode<all>\n"));
    assert!(tex.ends_with("\\mode*\n"));
}

#[test]
fn test_toc_lines() {
    let json = r#"[
        {"kind": "h1", "children": [{"kind": "str", "text": "One"}]},
        {"kind": "h2", "children": [{"kind": "str", "text": "Sub"}]},
        {"kind": "h1", "children": [{"kind": "str", "text": "Two"}]}
    ]"#;
    assert_eq!(
        export(json, Format::Toc),
        "* [One][one]\n\t* [Sub][sub]\n* [Two][two]\n"
    );
}

#[test]
fn test_opml_outline() {
    let json = r#"[
        {"kind": "h1", "children": [{"kind": "str", "text": "Top"}]},
        {"kind": "para", "children": [{"kind": "str", "text": "a < b"}]}
    ]"#;
    let opml = export(json, Format::Opml);
    assert!(opml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<opml version=\"1.0\">"));
    assert!(opml.contains("<outline text=\"Top\" _note=\"a &lt; b\">\n</outline>\n"));
}

#[test]
fn test_critic_formats() {
    let json = r#"[
        {"kind": "str", "text": "This is "},
        {"kind": "critic_addition", "text": "new "},
        {"kind": "critic_deletion", "text": "old "},
        {"kind": "critic_substitution", "text": "red~>blue"},
        {"kind": "str", "text": " text."}
    ]"#;
    assert_eq!(export(json, Format::CriticAccept), "This is new blue text.");
    assert_eq!(export(json, Format::CriticReject), "This is old red text.");
    assert!(export(json, Format::CriticHtml).contains("<ins>new </ins><del>old </del>"));
}

#[test]
fn test_every_tree_format_renders() {
    let expected = [
        (Format::Text, "Text"),
        (Format::Html, "class=\"footnote\">[1]</a>"),
        (Format::Latex, "Text\\footnote{Note.}"),
        (Format::Memoir, "Text\\footnote{Note.}"),
        (Format::Beamer, "Text\\footnote{Note.}"),
        (Format::Opml, "<opml version=\"1.0\">"),
        (Format::Odf, "<text:p text:style-name=\"Footnote\">Note.</text:p>"),
        (Format::Rtf, "{\\footnote\\pard\\plain{\\super\\chftn} Note.}"),
        (
            Format::Lyx,
            "Text\n\\begin_inset Foot\nstatus collapsed\n\n\n\\begin_layout Standard\nNote.\n\\end_layout\n",
        ),
    ];
    for (format, marker) in expected {
        let out = export_json(FOOTNOTE_DOC, &ExportOptions::new(format));
        assert!(out.is_ok(), "{format} failed: {out:?}");
        let out = out.unwrap();
        assert!(out.contains(marker), "{format} output lacks {marker:?}: {out}");
    }

    // No headings, so no contents
    assert_eq!(export(FOOTNOTE_DOC, Format::Toc), "");
}

// ============================================================================
// Options and Errors
// ============================================================================

#[test]
fn test_random_footnote_numbers_follow_seed() {
    let options = ExportOptions::new(Format::Html)
        .with_extension(Extensions::RANDOM_FOOT)
        .with_random_seed(7);
    let first = export_json(FOOTNOTE_DOC, &options).unwrap();
    let second = export_json(FOOTNOTE_DOC, &options).unwrap();
    assert_eq!(first, second);
    // The visible number stays sequential
    assert!(first.contains("class=\"footnote\">[1]</a>"));
}

#[test]
fn test_complete_flag_adds_document_shell() {
    let options = ExportOptions::new(Format::Html).with_extension(Extensions::COMPLETE);
    let html = export_json(r#"[{"kind": "para"}]"#, &options).unwrap();
    assert!(html.starts_with("<!DOCTYPE html>\n"));
    assert!(html.ends_with("</body>\n</html>"));
}

#[test]
fn test_malformed_json() {
    let err = export_json("[{\"kind\": \"para\"", &ExportOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Json(_)));

    let err = export_json(r#"[{"kind": "no_such_kind"}]"#, &ExportOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}

#[test]
fn test_link_on_wrong_node() {
    let err = export_json(r#"[{"kind": "para", "link": {}}]"#, &ExportOptions::default()).unwrap_err();
    assert!(matches!(err, Error::InvalidTree(_)));
}

#[test]
fn test_mmd_format_needs_source() {
    let err = export_json("[]", &ExportOptions::new(Format::Mmd)).unwrap_err();
    assert!(matches!(err, Error::SourceNeedsParser));
}

#[test]
fn test_unknown_format_name() {
    assert!(matches!(Format::from_name("docx"), Err(Error::UnknownFormat(name)) if name == "docx"));
    assert_eq!(Format::from_name("lyx").unwrap(), Format::Lyx);
    assert_eq!(Format::from_name("critic-html").unwrap(), Format::CriticHtml);
}

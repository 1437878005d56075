//! mmd-export - MultiMarkdown tree exporter

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mmd_export::label::key_from_string;
use mmd_export::transclude::{self, append_mmd_footer, prepend_mmd_header, transclude_source};
use mmd_export::util::{decode_text, time_seed_nanos};
use mmd_export::{Error, ExportOptions, Extensions, Format, Result, Tree, export_tree};

#[derive(Parser)]
#[command(name = "mmd-export")]
#[command(version, about = "Render MultiMarkdown document trees", long_about = None)]
#[command(after_help = "EXAMPLES:
    mmd-export doc.json                 Render a JSON tree as HTML on stdout
    mmd-export -t latex -o doc.tex doc.json
    mmd-export -b -t odf a.json b.json  Write a.fodt and b.fodt
    mmd-export -t mmd -x book.md        List the files book.md transcludes")]
struct Cli {
    /// Input files: JSON document trees, or source text with --to mmd (stdin if none)
    #[arg(value_name = "FILES")]
    files: Vec<PathBuf>,

    /// Output format (text, html, latex, memoir, beamer, opml, odf, rtf, lyx, toc,
    /// mmd, critic-accept, critic-reject, critic-html)
    #[arg(short, long, value_name = "FORMAT", default_value = "html")]
    to: String,

    /// Output file, `-` for stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Write one output file per input, named after the input
    #[arg(short, long)]
    batch: bool,

    /// Force a complete document
    #[arg(short, long)]
    full: bool,

    /// Force a snippet, even with metadata present
    #[arg(short, long)]
    snippet: bool,

    /// Typographic quotes and dashes
    #[arg(long, overrides_with = "nosmart")]
    smart: bool,
    #[arg(long, hide = true)]
    nosmart: bool,

    /// Footnotes, glossary entries and citations
    #[arg(long, overrides_with = "nonotes")]
    notes: bool,
    #[arg(long, hide = true)]
    nonotes: bool,

    /// Heading and table labels
    #[arg(long, overrides_with = "nolabels")]
    labels: bool,
    #[arg(long, hide = true)]
    nolabels: bool,

    /// Mask email addresses
    #[arg(long, overrides_with = "nomask")]
    mask: bool,
    #[arg(long, hide = true)]
    nomask: bool,

    /// Markdown.pl compatibility mode
    #[arg(short, long)]
    compatibility: bool,

    /// Process markdown inside HTML blocks
    #[arg(long)]
    process_html: bool,

    /// Backslash at line end forces a line break
    #[arg(long)]
    escaped_line_breaks: bool,

    /// List the metadata keys instead of rendering
    #[arg(short, long)]
    metadata_keys: bool,

    /// Print the value of one metadata key instead of rendering
    #[arg(short, long, value_name = "KEY")]
    extract: Option<String>,

    /// List the files an input transcludes instead of rendering
    #[arg(short = 'x', long)]
    manifest: bool,

    /// Accept all CriticMarkup changes
    #[arg(short, long)]
    accept: bool,

    /// Reject all CriticMarkup changes
    #[arg(short, long)]
    reject: bool,

    /// Pseudo-random footnote numbers
    #[arg(long)]
    random: bool,

    /// Seed for --random numbering (defaults to the clock)
    #[arg(long, value_name = "N")]
    seed: Option<u64>,
}

impl Cli {
    fn export_options(&self) -> Result<ExportOptions> {
        let format = Format::from_name(&self.to)?;
        let mut extensions = if self.compatibility {
            Extensions::COMPATIBILITY | Extensions::NO_LABELS | Extensions::OBFUSCATE
        } else {
            Extensions::DEFAULT
        };

        let toggles = [
            (self.full, self.full, Extensions::COMPLETE),
            (self.snippet, self.snippet, Extensions::SNIPPET),
            (self.smart, self.nosmart, Extensions::SMART),
            (self.notes, self.nonotes, Extensions::NOTES),
            (self.nolabels, self.labels, Extensions::NO_LABELS),
            (self.mask, self.nomask, Extensions::OBFUSCATE),
            (self.process_html, self.process_html, Extensions::PROCESS_HTML),
            (self.escaped_line_breaks, self.escaped_line_breaks, Extensions::ESCAPED_LINE_BREAKS),
            (self.accept, self.accept, Extensions::CRITIC_ACCEPT),
            (self.reject, self.reject, Extensions::CRITIC_REJECT),
            (self.random, self.random, Extensions::RANDOM_FOOT),
        ];
        for (on, off, flag) in toggles {
            if on {
                extensions.insert(flag);
            } else if off {
                extensions.remove(flag);
            }
        }
        if matches!(format, Format::Opml | Format::Beamer) {
            extensions.insert(Extensions::HEADING_SECTION);
        }

        let seed = self.seed.unwrap_or_else(time_seed_nanos);
        Ok(ExportOptions::new(format)
            .with_extensions(extensions)
            .with_random_seed(seed))
    }
}

/// One input document and the file it came from.
struct Input {
    path: Option<PathBuf>,
    text: String,
}

impl Input {
    fn read(path: &Path) -> Result<Input> {
        let bytes = std::fs::read(path)?;
        Ok(Input {
            path: Some(path.to_path_buf()),
            text: decode_text(&bytes).into_owned(),
        })
    }

    fn stdin() -> Result<Input> {
        let mut bytes = Vec::new();
        std::io::stdin().read_to_end(&mut bytes)?;
        Ok(Input {
            path: None,
            text: decode_text(&bytes).into_owned(),
        })
    }

    fn base_dir(&self) -> PathBuf {
        self.path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    fn is_json(&self) -> bool {
        self.text.trim_start().starts_with(['{', '['])
    }

    fn tree(&self) -> Result<Tree> {
        if !self.is_json() {
            return Err(Error::SourceNeedsParser);
        }
        Tree::from_json(&self.text)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "mmd_export=warn".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let options = cli.export_options()?;
    debug!(format = %options.format, extensions = options.extensions.bits(), "options");

    let inputs = if cli.files.is_empty() {
        vec![Input::stdin()?]
    } else {
        cli.files
            .iter()
            .map(|path| Input::read(path))
            .collect::<Result<Vec<_>>>()?
    };

    if cli.batch {
        for input in &inputs {
            let out = process(cli, &options, input)?;
            let target = match &input.path {
                Some(path) => options.format.output_path(path),
                None => PathBuf::from("-"),
            };
            write_output(Some(&target), &out)?;
        }
        return Ok(());
    }

    let mut out = String::new();
    for input in &inputs {
        out.push_str(&process(cli, &options, input)?);
    }
    write_output(cli.output.as_deref(), &out)
}

/// Produce the output text for one input.
fn process(cli: &Cli, options: &ExportOptions, input: &Input) -> Result<String> {
    if options.format == Format::Mmd || cli.manifest {
        return Ok(process_source(cli, options, input));
    }

    let tree = input.tree()?;
    if cli.metadata_keys {
        return Ok(lines(tree.metadata_keys()));
    }
    if let Some(key) = &cli.extract {
        let value = tree.metavalue_for_key(&key_from_string(key));
        return Ok(lines(value));
    }
    export_tree(tree, options)
}

/// Source text is only transcluded, never parsed.
fn process_source(cli: &Cli, options: &ExportOptions, input: &Input) -> String {
    if let Some(key) = &cli.extract {
        return lines(transclude::metadata_value(&input.text, &key_from_string(key)));
    }

    let mut text = input.text.clone();
    if options.extensions.contains(Extensions::COMPATIBILITY) {
        return text;
    }
    prepend_mmd_header(&mut text);
    append_mmd_footer(&mut text);

    let mut manifest = Vec::new();
    let text = transclude_source(&text, &input.base_dir(), options.format, Some(&mut manifest));
    if cli.manifest {
        return lines(manifest.iter().map(|path| path.display().to_string()));
    }
    text
}

fn lines(items: impl IntoIterator<Item = String>) -> String {
    items.into_iter().map(|item| item + "\n").collect()
}

fn write_output(path: Option<&Path>, text: &str) -> Result<()> {
    match path {
        Some(path) if path != Path::new("-") => {
            std::fs::write(path, text)?;
            debug!(path = %path.display(), "wrote output");
        }
        _ => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

//! Publishing (and compile-only) over a set of markdown files.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use mdpub_config::{CliSettings, Config, Credentials};
use mdpub_confluence::{
    Auth, ConfluenceClient, Document, DocumentOptions, PublishOptions, PublishReport, Publisher,
    compiler_for,
};
use mdpub_diagrams::KrokiRenderer;
use mdpub_includes::ExpandOptions;
use mdpub_meta::ExtractOptions;
use mdpub_renderer::{CompileOptions, DiagramRenderer};

use crate::error::{CliError, chain};
use crate::output::Output;

/// Delay before retrying a failed idempotent request; grows per attempt.
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Arguments for publishing documents.
#[derive(Args)]
pub(crate) struct PublishArgs {
    /// Markdown files or glob patterns (e.g. `docs/**/*.md`).
    #[arg(required = true)]
    files: Vec<String>,

    /// Path to configuration file (default: auto-discover mdpub.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Confluence base URL (overrides config).
    #[arg(long, env = "MDPUB_BASE_URL")]
    base_url: Option<String>,

    /// Username for basic authentication.
    #[arg(short, long, env = "MDPUB_USERNAME")]
    username: Option<String>,

    /// Password or API token for basic authentication.
    #[arg(short, long, env = "MDPUB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Personal access token for bearer authentication.
    #[arg(long, env = "MDPUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Space for documents without a `Space` header.
    #[arg(long)]
    space: Option<String>,

    /// Parent titles prepended to each document's own (comma separated).
    #[arg(long, value_delimiter = ',')]
    parents: Option<Vec<String>>,

    /// Publish to this page id instead of resolving the page by title.
    #[arg(long)]
    page_id: Option<String>,

    /// Print the compiled storage format and do not contact Confluence.
    #[arg(long, conflicts_with = "dry_run")]
    compile_only: bool,

    /// Resolve pages read-only and report what would change.
    #[arg(long)]
    dry_run: bool,

    /// Skip documents that fail and continue with the rest.
    #[arg(long)]
    continue_on_error: bool,

    /// Skip the page update when the rendered content is unchanged.
    #[arg(long)]
    changes_only: bool,

    /// Mark updates as minor edits (no watcher notifications).
    #[arg(long)]
    minor_edit: bool,

    /// Version message for updates.
    #[arg(short = 'm', long)]
    version_message: Option<String>,

    /// Restrict editing of published pages to the publishing user.
    #[arg(long)]
    edit_lock: bool,

    /// Take the title from the first level-1 heading when no `Title` header exists.
    #[arg(long)]
    title_from_h1: bool,

    /// Do not render the first level-1 heading.
    #[arg(long)]
    drop_h1: bool,

    /// Render soft line breaks as spaces.
    #[arg(long)]
    strip_linebreaks: bool,

    /// Default image alignment (left, center, right).
    #[arg(long)]
    image_align: Option<String>,

    /// Kroki server URL for diagram rendering (overrides config).
    #[arg(long, env = "MDPUB_KROKI_URL")]
    kroki_url: Option<String>,

    /// Width multiplier for rendered diagrams.
    #[arg(long)]
    diagram_scale: Option<f64>,
}

/// Outcome of a run over all matched files.
pub(crate) struct Summary {
    pub(crate) total: usize,
    pub(crate) failed: usize,
}

impl PublishArgs {
    fn cli_settings(&self) -> CliSettings {
        CliSettings {
            base_url: self.base_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            token: self.token.clone(),
            space: self.space.clone(),
            parents: self.parents.clone(),
            title_from_h1: self.title_from_h1.then_some(true),
            drop_h1: self.drop_h1.then_some(true),
            strip_linebreaks: self.strip_linebreaks.then_some(true),
            changes_only: self.changes_only.then_some(true),
            minor_edit: self.minor_edit.then_some(true),
            version_message: self.version_message.clone(),
            edit_lock: self.edit_lock.then_some(true),
            image_align: self.image_align.clone(),
            continue_on_error: self.continue_on_error.then_some(true),
            kroki_url: self.kroki_url.clone(),
            diagram_scale: self.diagram_scale,
        }
    }

    /// Compile or publish every matched file.
    ///
    /// # Errors
    ///
    /// Returns the first document error unless continue-on-error is set, and
    /// configuration or file pattern errors.
    pub(crate) fn execute(self, output: &Output) -> Result<Summary, CliError> {
        let config = Config::load(self.config.as_deref(), Some(&self.cli_settings()))?;
        let files = expand_patterns(&self.files)?;
        if self.page_id.is_some() && files.len() > 1 {
            return Err(CliError::Validation(format!(
                "--page-id targets a single page but {} files matched",
                files.len()
            )));
        }

        let documents = document_options(&config);
        let compile = compile_options(&config);
        let kroki = diagram_renderer(&config);
        let diagrams = kroki.as_ref().map(|r| r as &dyn DiagramRenderer);
        let continue_on_error = config.publish.continue_on_error;

        if self.compile_only {
            return run(&files, continue_on_error, output, |path| {
                let document = Document::load(path, &documents)?;
                let compiler = compiler_for(&document, &compile, diagrams);
                let page = document.render(&compiler, &document.markdown)?;
                let mut stdout = std::io::stdout().lock();
                writeln!(stdout, "{}", page.markup)?;
                Ok(())
            });
        }

        let confluence = config.require_confluence()?;
        let client = ConfluenceClient::with_timeout(
            &confluence.base_url,
            &auth(confluence.credentials()),
            confluence.timeout(),
        )
        .with_retries(confluence.retries, RETRY_DELAY);

        let options = PublishOptions {
            dry_run: self.dry_run,
            changes_only: config.publish.changes_only,
            minor_edit: config.publish.minor_edit,
            version_message: config.publish.version_message.clone(),
            edit_lock: config.publish.edit_lock,
            create_grace: config.publish.create_grace(),
            page_id: self.page_id.clone(),
        };
        let mut publisher = Publisher::new(&client, compile, options);
        if let Some(renderer) = diagrams {
            publisher = publisher.with_diagrams(renderer);
        }

        run(&files, continue_on_error, output, |path| {
            let document = Document::load(path, &documents)?;
            let report = publisher.publish(&document)?;
            print_report(output, &report);
            Ok(())
        })
    }
}

/// Apply `process` to each file in order. Failures abort the run unless
/// `continue_on_error` is set, in which case they are reported and counted.
fn run(
    files: &[PathBuf],
    continue_on_error: bool,
    output: &Output,
    mut process: impl FnMut(&Path) -> Result<(), CliError>,
) -> Result<Summary, CliError> {
    let mut failed = 0;
    for path in files {
        tracing::debug!(path = %path.display(), "Processing document");
        match process(path) {
            Ok(()) => {}
            Err(err) if continue_on_error => {
                failed += 1;
                let mut lines = chain(&err).into_iter();
                if let Some(first) = lines.next() {
                    output.warning(&format!("Skipping {}: {first}", path.display()));
                }
                for line in lines {
                    output.warning(&format!("  {line}"));
                }
            }
            Err(err) => return Err(err),
        }
    }
    Ok(Summary {
        total: files.len(),
        failed,
    })
}

/// Expand glob patterns into a sorted, de-duplicated file list.
fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>, CliError> {
    let mut files = Vec::new();
    for pattern in patterns {
        let matches = glob::glob(pattern).map_err(|source| CliError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        let before = files.len();
        files.extend(matches.filter_map(Result::ok).filter(|path| path.is_file()));
        if files.len() == before {
            return Err(CliError::NoMatch(pattern.clone()));
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn document_options(config: &Config) -> DocumentOptions {
    DocumentOptions {
        extract: ExtractOptions {
            parents: config.publish.parents.clone(),
            space: config.publish.space.clone(),
            title_from_h1: config.publish.title_from_h1,
        },
        expand: ExpandOptions {
            include_dirs: config.publish.include_dirs.clone(),
            ..ExpandOptions::default()
        },
    }
}

fn compile_options(config: &Config) -> CompileOptions {
    CompileOptions {
        base_dir: PathBuf::new(),
        drop_h1: config.publish.drop_h1,
        strip_linebreaks: config.publish.strip_linebreaks,
        image_align: config.publish.image_align.clone(),
        diagram_scale: config
            .diagrams
            .kroki_url
            .as_ref()
            .map(|_| config.diagrams.scale),
    }
}

fn diagram_renderer(config: &Config) -> Option<KrokiRenderer> {
    let url = config.diagrams.kroki_url.as_deref()?;
    let renderer = KrokiRenderer::new(url, config.diagrams.timeout());
    Some(if config.diagrams.enabled.is_empty() {
        renderer
    } else {
        renderer.with_languages(&config.diagrams.enabled)
    })
}

fn auth(credentials: Credentials) -> Auth {
    match credentials {
        Credentials::Basic { username, password } => Auth::Basic { username, password },
        Credentials::Bearer(token) => Auth::Bearer(token),
        Credentials::Anonymous => Auth::Anonymous,
    }
}

fn print_report(output: &Output, report: &PublishReport) {
    if report.dry_run {
        output.highlight(&format!("[DRY RUN] {}", report.path.display()));
    } else {
        output.highlight(&report.path.display().to_string());
    }

    for title in &report.created_pages {
        let verb = if report.dry_run { "Would create" } else { "Created" };
        output.info(&format!("{verb} page: {title}"));
    }

    match (&report.page_id, report.version) {
        (Some(id), Some(version)) => {
            output.info(&format!("Page: \"{}\" (id {id}, v{version})", report.title));
        }
        _ => output.info(&format!("Page: \"{}\" (not created yet)", report.title)),
    }
    if let Some(link) = &report.link {
        output.detail(&format!("URL: {link}"));
    }

    if report.attachments_created + report.attachments_updated > 0 {
        let prefix = if report.dry_run { "Would upload" } else { "Uploaded" };
        output.info(&format!(
            "{prefix} attachments: {} new, {} changed",
            report.attachments_created, report.attachments_updated
        ));
    }
    if !report.labels.is_empty() {
        output.info(&format!(
            "Labels: +[{}] -[{}]",
            report.labels.add.join(", "),
            report.labels.remove.join(", ")
        ));
    }

    for warning in &report.warnings {
        output.warning(&format!("Warning: {warning}"));
    }

    if report.unchanged {
        output.success("Content unchanged, update skipped.");
    } else if report.updated {
        output.success("Page updated.");
    } else if report.dry_run {
        output.success("No changes made.");
    }
}

use anyhow::Result;
use clap::Parser;
use mapping_finder::bundle::RawBundle;
use mapping_finder::cli::{Cli, Commands, SearchKind};
use mapping_finder::config::resolve_data_dir;
use mapping_finder::model::{MappingDatabase, MappingKind, Method, Parameter, Side};
use mapping_finder::parse::FormatGeneration;
use mapping_finder::search::{ClassWalk, Paged, SearchHit};
use mapping_finder::store::{IngestOutcome, VersionStore};
use mapping_finder::version::VersionKey;
use serde::Serialize;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = VersionStore::open(resolve_data_dir(&cli)?)?;

    match cli.command.clone() {
        Commands::Ingest {
            version,
            bundle,
            snapshot,
        } => {
            let report = ingest(&store, &version, &bundle, snapshot)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Search {
            term,
            mc,
            kind,
            page,
            page_size,
        } => {
            store.load_all()?;
            let report = search(&store, &term, &mc, kind, page, page_size)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Versions => {
            store.load_all()?;
            let latest = store.latest();
            let versions: Vec<VersionReport> = store
                .versions()
                .into_iter()
                .map(|(version, snapshot)| VersionReport {
                    latest: latest.as_deref() == Some(version.as_str()),
                    version,
                    snapshot,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&versions)?);
        }
        Commands::Stats => {
            store.load_all()?;
            let mut stats = Vec::new();
            for (version, _) in store.versions() {
                let db = store.get_forest(&version)?;
                stats.push(StatsReport::for_database(&db));
            }
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct IngestReport {
    mc_version: String,
    snapshot: String,
    outcome: IngestOutcome,
    classes: usize,
    duration_ms: u64,
}

fn ingest(
    store: &VersionStore,
    version: &str,
    bundle_path: &std::path::Path,
    snapshot: Option<String>,
) -> Result<IngestReport> {
    let start = Instant::now();
    let key: VersionKey = version.parse()?;
    let generation = FormatGeneration::for_version(&key);
    let bundle = RawBundle::load(bundle_path, generation)?;
    let snapshot = snapshot.unwrap_or_else(|| bundle.digest());
    let outcome = store.ingest(version, &snapshot, &bundle)?;
    let db = store.get_forest(version)?;
    Ok(IngestReport {
        mc_version: version.to_string(),
        snapshot,
        outcome,
        classes: db.classes.len(),
        duration_ms: start.elapsed().as_millis() as u64,
    })
}

#[derive(Debug, Serialize)]
struct VersionReport {
    version: String,
    snapshot: String,
    latest: bool,
}

#[derive(Debug, Serialize)]
struct StatsReport {
    version: String,
    snapshot: String,
    classes: usize,
    fields: usize,
    methods: usize,
    constructors: usize,
    parameters: usize,
}

impl StatsReport {
    fn for_database(db: &MappingDatabase) -> Self {
        let mut report = Self {
            version: db.mc_version.clone(),
            snapshot: db.snapshot.clone(),
            classes: 0,
            fields: 0,
            methods: 0,
            constructors: 0,
            parameters: 0,
        };
        for class in ClassWalk::new(&db.classes) {
            report.classes += 1;
            report.fields += class.fields.len();
            report.methods += class.methods.len();
            report.constructors += class.constructors.len();
            report.parameters += class
                .methods
                .iter()
                .chain(class.constructors.iter())
                .map(|m| m.parameters.len())
                .sum::<usize>();
        }
        report
    }
}

#[derive(Debug, Serialize)]
struct ParameterReport {
    intermediate_name: String,
    name: Option<String>,
    physical_side: Side,
}

impl ParameterReport {
    fn new(parameter: &Parameter) -> Self {
        Self {
            intermediate_name: parameter.intermediate_name.clone(),
            name: parameter.name.clone(),
            physical_side: parameter.side,
        }
    }
}

#[derive(Debug, Serialize)]
struct HitReport {
    #[serde(rename = "type")]
    kind: MappingKind,
    /// Owning class for fields/methods, owning method for parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
    original_name: Option<String>,
    intermediate_name: String,
    name: Option<String>,
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    physical_side: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_static: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parameters: Vec<ParameterReport>,
}

impl HitReport {
    fn method_owner(method: &Method) -> String {
        method
            .name
            .clone()
            .unwrap_or_else(|| method.intermediate_name.clone())
    }

    fn from_hit(hit: SearchHit<'_>) -> Self {
        match hit {
            SearchHit::Field(field, class) => Self {
                kind: MappingKind::Field,
                owner: Some(class.intermediate_name.clone()),
                original_name: field.original_name.clone(),
                intermediate_name: field.intermediate_name.clone(),
                name: field.name.clone(),
                description: field.description.clone(),
                physical_side: Some(field.side),
                signature: None,
                is_static: None,
                parameters: Vec::new(),
            },
            SearchHit::Method(method, class) => Self {
                kind: MappingKind::Method,
                owner: Some(class.intermediate_name.clone()),
                original_name: method.original_name.clone(),
                intermediate_name: method.intermediate_name.clone(),
                name: method.name.clone(),
                description: method.description.clone(),
                physical_side: Some(method.side),
                signature: Some(method.signature.clone()),
                is_static: Some(method.is_static),
                parameters: method.parameters.iter().map(ParameterReport::new).collect(),
            },
            SearchHit::Parameter(parameter, method) => Self {
                kind: MappingKind::Parameter,
                owner: Some(Self::method_owner(method)),
                original_name: parameter.original_name.clone(),
                intermediate_name: parameter.intermediate_name.clone(),
                name: parameter.name.clone(),
                description: parameter.description.clone(),
                physical_side: Some(parameter.side),
                signature: None,
                is_static: None,
                parameters: Vec::new(),
            },
            SearchHit::Class(class) => Self {
                kind: MappingKind::Class,
                owner: None,
                original_name: class.original_name.clone(),
                intermediate_name: class.intermediate_name.clone(),
                name: class.name.clone(),
                description: class.description.clone(),
                physical_side: None,
                signature: None,
                is_static: None,
                parameters: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct SearchReport {
    version: String,
    term: String,
    page: usize,
    page_size: usize,
    found: usize,
    results: Vec<HitReport>,
}

fn search(
    store: &VersionStore,
    term: &str,
    mc: &str,
    kind: SearchKind,
    page: usize,
    page_size: usize,
) -> Result<SearchReport> {
    let page_size = page_size.max(1);
    let db = store.get_forest(mc)?;

    let hits: Box<dyn Iterator<Item = SearchHit<'_>>> = match kind {
        SearchKind::All => Box::new(db.search_all(term)),
        SearchKind::Field => Box::new(db.search_field(term).map(|(f, c)| SearchHit::Field(f, c))),
        SearchKind::Method => Box::new(
            db.search_method(term)
                .map(|(m, c)| SearchHit::Method(m, c)),
        ),
        SearchKind::Param => Box::new(
            db.search_parameters(term)
                .map(|(p, m)| SearchHit::Parameter(p, m)),
        ),
        SearchKind::Class => Box::new(db.search_classes(term).map(SearchHit::Class)),
    };

    // Forward-only sequence: reaching page N means pulling past the first
    // N pages again.
    let mut paged = Paged::new(hits, page_size);
    for _ in 0..page {
        if paged.next_page().is_empty() {
            break;
        }
    }
    let results: Vec<HitReport> = paged
        .next_page()
        .into_iter()
        .map(HitReport::from_hit)
        .collect();

    Ok(SearchReport {
        version: db.mc_version.clone(),
        term: term.to_string(),
        page,
        page_size,
        found: results.len(),
        results,
    })
}

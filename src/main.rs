use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;

use attck_pe::agent::CodeAgentBuilder;
use attck_pe::config::{self, Settings};
use attck_pe::generation::Generator;
use attck_pe::index::{DocumentReader, EmbedModel, RetrieverQueryEngine, VectorIndex};
use attck_pe::ollama::{ChatClient, OllamaClient};
use attck_pe::persistence::OutputStore;
use attck_pe::pipeline::OutputPipeline;
use attck_pe::repl::{ModelUnloader, PromptLoop};
use attck_pe::tools::{CodeReader, RetrievalTool, ToolSet};
use attck_pe::{metrics, prompts};

#[derive(Parser, Debug)]
#[command(name = "attck-pe", version, about = "Generate red-team code from prompts with a local LLM")]
struct Cli {
    /// Directory of reference documents to index
    #[arg(long, value_parser = existing_dir)]
    document_path: Option<PathBuf>,

    /// Model used to answer retrieval queries and re-format answers
    #[arg(long)]
    llm_model: Option<String>,

    /// Embedding model ("local:<name>" for in-process TF-IDF, otherwise an Ollama model)
    #[arg(long)]
    embed_model: Option<String>,

    /// Model driving the reasoning agent
    #[arg(long)]
    code_agent_model: Option<String>,

    /// Base URL of the Ollama server
    #[arg(long)]
    ollama_url: Option<String>,

    /// Directory generated code is written to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Attempts per prompt before giving up
    #[arg(long)]
    max_attempts: Option<usize>,

    /// OTLP endpoint for trace export (e.g. http://localhost:4317)
    #[arg(long)]
    otlp_endpoint: Option<String>,

    /// Write Prometheus metrics to this file on exit
    #[arg(long)]
    metrics_path: Option<PathBuf>,

    /// Unload the models from Ollama after every prompt
    #[arg(long)]
    unload_after_round: bool,

    /// Directory with prompt template overrides
    #[arg(long)]
    prompt_dir: Option<PathBuf>,
}

impl Cli {
    /// Environment variables for every given flag
    fn env_overrides(&self) -> Vec<(&'static str, String)> {
        let mut vars: Vec<(&'static str, String)> = Vec::new();
        let path = |p: &PathBuf| p.display().to_string();

        if let Some(v) = &self.document_path {
            vars.push((config::DOCUMENT_PATH_KEY, path(v)));
        }
        if let Some(v) = &self.llm_model {
            vars.push((config::LLM_MODEL_KEY, v.clone()));
        }
        if let Some(v) = &self.embed_model {
            vars.push((config::EMBED_MODEL_KEY, v.clone()));
        }
        if let Some(v) = &self.code_agent_model {
            vars.push((config::CODE_AGENT_MODEL_KEY, v.clone()));
        }
        if let Some(v) = &self.ollama_url {
            vars.push((config::OLLAMA_URL_KEY, v.clone()));
        }
        if let Some(v) = &self.output_dir {
            vars.push((config::OUTPUT_DIR_KEY, path(v)));
        }
        if let Some(v) = self.max_attempts {
            vars.push((config::MAX_ATTEMPTS_KEY, v.to_string()));
        }
        if let Some(v) = &self.otlp_endpoint {
            vars.push((config::OTLP_ENDPOINT_KEY, v.clone()));
        }
        if let Some(v) = &self.metrics_path {
            vars.push((config::METRICS_PATH_KEY, path(v)));
        }
        if self.unload_after_round {
            vars.push((config::UNLOAD_AFTER_ROUND_KEY, "true".to_string()));
        }
        if let Some(v) = &self.prompt_dir {
            vars.push((config::PROMPT_DIR_KEY, path(v)));
        }

        vars
    }
}

fn existing_dir(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("{} is not an existing directory", value))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // 1. Environment: .env first, then CLI flags on top. Exported while the
    //    process is still single-threaded.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    for (key, value) in cli.env_overrides() {
        std::env::set_var(key, value);
    }

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run())
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = Settings::from_env()?;
    settings.validate()?;

    attck_pe::tracing::init_tracing("attck-pe", settings.otlp_endpoint.as_deref())?;
    info!(
        document_path = %settings.document_path.display(),
        llm_model = %settings.llm_model,
        embed_model = %settings.embed_model,
        code_agent_model = %settings.code_agent_model,
        "Starting attck-pe"
    );

    // 2. Read and index the reference documents
    let documents = DocumentReader::new().load_data(&settings.document_path)?;
    let llm = OllamaClient::with_timeout(&settings.ollama_url, settings.request_timeout)?;
    let embed_model = EmbedModel::parse(&settings.embed_model)?;
    let index = Arc::new(VectorIndex::from_documents(&documents, &embed_model, &llm).await?);

    // 3. Tools and agent session
    let engine = RetrieverQueryEngine::new(index, llm.clone(), settings.llm_model.as_str())
        .with_top_k(settings.retrieval_top_k);
    let tools = ToolSet::new(
        Arc::new(CodeReader::new(&settings.document_path)),
        Arc::new(RetrievalTool::new(Arc::new(engine))),
    );
    let agent = CodeAgentBuilder::new(ChatClient::with_timeout(&settings.ollama_url, settings.request_timeout)?)
        .model(settings.code_agent_model.as_str())
        .context(prompts::get_context(settings.prompt_dir.as_deref())?)
        .tools(tools)
        .max_iterations(settings.agent_max_iterations)
        .build()?;

    // 4. Re-format pipeline and interactive loop
    let parser_template = prompts::get_code_parser_template(settings.prompt_dir.as_deref())?;
    let pipeline = OutputPipeline::new(llm.clone(), settings.llm_model.as_str(), &parser_template);

    let mut prompt_loop = PromptLoop::new(
        Arc::new(agent),
        Arc::new(pipeline),
        Generator::new(settings.max_attempts),
        OutputStore::new(&settings.output_dir),
    );
    if settings.unload_after_round {
        prompt_loop = prompt_loop.with_cleanup(Arc::new(ModelUnloader::new(
            llm.clone(),
            vec![settings.llm_model.clone(), settings.code_agent_model.clone()],
        )));
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let summary = prompt_loop.run(stdin, &mut stdout).await?;
    info!(
        rounds = summary.rounds,
        generated = summary.generated,
        saved = summary.saved,
        "Prompt loop finished"
    );

    // 5. Metrics textfile and trace flush
    if let Some(path) = &settings.metrics_path {
        let text = metrics::render().map_err(|e| e.to_string())?;
        tokio::fs::write(path, text).await?;
        info!(path = %path.display(), "Wrote metrics");
    }

    attck_pe::tracing::shutdown_tracing();
    Ok(())
}

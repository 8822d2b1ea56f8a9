//! End-to-end rounds of the interactive loop with mock collaborators

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use attck_pe::agent::{Agent, AgentError};
use attck_pe::generation::Generator;
use attck_pe::persistence::OutputStore;
use attck_pe::pipeline::{PipelineError, Reformatter};
use attck_pe::repl::{LoopSummary, PromptLoop, RoundCleanup, PROMPT_TEXT};

/// Agent that records prompts and always answers with `answer`
struct RecordingAgent {
    answer: &'static str,
    prompts: Mutex<Vec<String>>,
}

impl RecordingAgent {
    fn new(answer: &'static str) -> Arc<Self> {
        Arc::new(Self {
            answer,
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Agent for RecordingAgent {
    async fn query(&self, prompt: &str) -> Result<String, AgentError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.to_string())
    }
}

struct Passthrough;

#[async_trait]
impl Reformatter for Passthrough {
    async fn reformat(&self, response: &str) -> Result<String, PipelineError> {
        Ok(response.to_string())
    }
}

#[derive(Default)]
struct CountingCleanup {
    rounds: AtomicUsize,
}

#[async_trait]
impl RoundCleanup for CountingCleanup {
    async fn after_round(&self) {
        self.rounds.fetch_add(1, Ordering::SeqCst);
    }
}

const DEMO: &str = "{'code': 'print(1)', 'description': 'demo', 'filename': 'demo.py'}";

async fn run_loop(prompt_loop: &PromptLoop, input: &str) -> (LoopSummary, String) {
    let mut output = Vec::new();
    let summary = prompt_loop.run(input.as_bytes(), &mut output).await.unwrap();
    (summary, String::from_utf8(output).unwrap())
}

#[tokio::test]
async fn test_quit_first_makes_no_calls() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = RecordingAgent::new(DEMO);
    let prompt_loop = PromptLoop::new(
        agent.clone(),
        Arc::new(Passthrough),
        Generator::new(5),
        OutputStore::new(tmp.path().join("output")),
    );

    let (summary, output) = run_loop(&prompt_loop, "q\nmake something\n").await;

    assert_eq!(summary, LoopSummary::default());
    assert!(agent.prompts().is_empty());
    assert!(!tmp.path().join("output").exists());
    assert_eq!(output, PROMPT_TEXT);
}

#[tokio::test]
async fn test_successful_round_writes_file() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = RecordingAgent::new(DEMO);
    let prompt_loop = PromptLoop::new(
        agent.clone(),
        Arc::new(Passthrough),
        Generator::new(5),
        OutputStore::new(tmp.path().join("output")),
    );

    let (summary, output) = run_loop(&prompt_loop, "print one\r\nq\n").await;

    assert_eq!(summary, LoopSummary { rounds: 1, generated: 1, saved: 1 });
    assert_eq!(agent.prompts(), vec!["print one".to_string()]);

    let saved = tmp.path().join("output").join("demo.py");
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), "print(1)");
    assert!(output.contains("Code Generated\nprint(1)\n\n\nDescription: demo\n"));
    assert!(output.contains(&format!("Saved file {}\n", saved.display())));
    assert!(output.ends_with(PROMPT_TEXT));
}

#[tokio::test]
async fn test_failed_round_reports_and_prompts_again() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = RecordingAgent::new("I cannot format this");
    let cleanup = Arc::new(CountingCleanup::default());
    let prompt_loop = PromptLoop::new(
        agent.clone(),
        Arc::new(Passthrough),
        Generator::new(2),
        OutputStore::new(tmp.path().join("output")),
    )
    .with_cleanup(cleanup.clone());

    let (summary, output) = run_loop(&prompt_loop, "first\nsecond\nq\n").await;

    assert_eq!(summary, LoopSummary { rounds: 2, generated: 0, saved: 0 });
    assert_eq!(agent.prompts().len(), 4);
    assert_eq!(cleanup.rounds.load(Ordering::SeqCst), 2);

    let failure = format!("Failed to generate code after 2 attempts.\n{}", PROMPT_TEXT);
    assert_eq!(output.matches(&failure).count(), 2);
    assert!(!tmp.path().join("output").exists());
}

#[tokio::test]
async fn test_empty_prompt_is_passed_through_and_eof_ends_loop() {
    let tmp = tempfile::tempdir().unwrap();
    let agent = RecordingAgent::new(DEMO);
    let prompt_loop = PromptLoop::new(
        agent.clone(),
        Arc::new(Passthrough),
        Generator::new(1),
        OutputStore::new(tmp.path().join("output")),
    );

    let (summary, _) = run_loop(&prompt_loop, "\n").await;

    assert_eq!(summary.rounds, 1);
    assert_eq!(agent.prompts(), vec![String::new()]);
}

#[tokio::test]
async fn test_save_error_is_reported_and_loop_continues() {
    let tmp = tempfile::tempdir().unwrap();
    let blocked = tmp.path().join("output");
    std::fs::write(&blocked, "a file, not a directory").unwrap();

    let prompt_loop = PromptLoop::new(
        RecordingAgent::new(DEMO),
        Arc::new(Passthrough),
        Generator::new(1),
        OutputStore::new(&blocked),
    );

    let (summary, output) = run_loop(&prompt_loop, "one\ntwo\nq\n").await;

    assert_eq!(summary, LoopSummary { rounds: 2, generated: 2, saved: 0 });
    assert_eq!(output.matches("Error saving file: ").count(), 2);
}

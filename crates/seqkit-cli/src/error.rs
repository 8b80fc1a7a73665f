use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    ArgumentParse(#[from] clap::Error),
    #[error(transparent)]
    Validation(#[from] seqkit_engine::ValidationError),
    #[error(transparent)]
    Env(#[from] seqkit_engine::EnvError),
    #[error(transparent)]
    Exec(#[from] seqkit_engine::ExecError),
    #[error(transparent)]
    Pipeline(#[from] seqkit_engine::PipelineError),
    #[error(transparent)]
    Report(#[from] seqkit_report::ReportError),
}

//! Model Registry Example
//!
//! Walks the registry lifecycle step by step:
//! - Train a random forest and log it in a tracked run
//! - Register the logged model as a new version
//! - Load it back by run URI and by registry URI, then predict
//! - Promote versions through stages, archiving the previous one
//!
//! Run with: cargo run --example model_registry

use regflow::client;
use regflow::prelude::*;
use tempfile::TempDir;

fn main() -> Result<()> {
    println!("=== Model Registry Example ===\n");

    let temp_dir = TempDir::new()?;
    let registry = Registry::open(RegistryConfig::new(temp_dir.path()))?;
    let workflow = RegistryWorkflow::new(&registry, WorkflowConfig::default());
    let model_name = workflow.config().model_name();

    // Step by step, using the workflow operations directly
    println!("1. Training and logging model...");
    let (params, artifact) = workflow.train()?;
    let run_id = workflow.log_and_start_run(&params, &artifact)?;
    let run_uri = ArtifactUri::run(run_id, "model");
    println!("   ✓ logged {run_uri}");

    println!("\n2. Registering {model_name}...");
    let mv = workflow.register(&run_uri, &model_name)?;
    println!("   Name: {}", mv.name);
    println!("   Version: {}", mv.version);
    println!("   Stage: {}", mv.current_stage);

    println!("\n3. Predicting from both URIs...");
    let rows = vec![vec![0.0, 1.0, 0.0]];
    let from_run = workflow.load_and_predict(&run_uri, &rows)?;
    let from_registry = workflow.load_and_predict(&mv.model_uri(), &rows)?;
    println!("   {run_uri} -> {from_run:?}");
    println!("   {} -> {from_registry:?}", mv.model_uri());

    println!("\n4. Promoting version {} to Staging...", mv.version);
    workflow.transition_stage(&model_name, mv.version, ModelStage::Staging)?;

    // Register a second version and promote it, archiving the first
    println!("\n5. Registering a second version and promoting it...");
    let v2 = workflow.register(&run_uri, &model_name)?;
    registry.transition_model_version_stage(&model_name, v2.version, ModelStage::Staging, true)?;

    for v in registry.list_model_versions(&model_name)? {
        println!("   v{} -> {}", v.version, v.current_stage);
    }

    let staged = client::resolve_version(&registry, &model_name, ModelSelector::Stage(ModelStage::Staging))?;
    println!("\n   models:/{model_name}/Staging resolves to version {}", staged.version);

    let stats = registry.storage_stats()?;
    println!("\n=== Registry Statistics ===");
    println!("   Runs:     {}", stats.run_count);
    println!("   Versions: {}", stats.version_count);
    println!("   Objects:  {}", stats.object_count);

    Ok(())
}

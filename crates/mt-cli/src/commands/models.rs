//! Models command implementation

use anyhow::{Context, Result};
use mt_core::{ModelId, ModelName, ModelRecord, ModelVersion, TrainingParams};

use crate::cli::{
    GlobalArgs, ModelCommands, ModelListArgs, ModelNameArgs, ModelTrainArgs, ModelVersionArgs,
    ModelsArgs,
};
use crate::commands::common::{format_optional_timestamp, format_timestamp, print_table};
use crate::context::RuntimeContext;

/// Execute the models command
pub async fn execute(args: &ModelsArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    match &args.command {
        ModelCommands::List(sub) => list(&ctx, sub),
        ModelCommands::Create(sub) => train(&ctx, sub, false).await,
        ModelCommands::Retrain(sub) => train(&ctx, sub, true).await,
        ModelCommands::Activate(sub) => activate(&ctx, sub).await,
        ModelCommands::DeleteVersion(sub) => delete_version(&ctx, sub).await,
        ModelCommands::Drop(sub) => drop(&ctx, sub).await,
    }
}

fn model_id(ctx: &RuntimeContext, project: Option<&str>, name: &str) -> Result<ModelId> {
    let project = ctx.project(project)?;
    let name = ModelName::try_new(name).context("Invalid model name")?;
    Ok(ModelId::new(project, name))
}

fn list(ctx: &RuntimeContext, args: &ModelListArgs) -> Result<()> {
    let project = ctx.project_filter(args.project.as_deref())?;
    let manager = ctx.engine.models();

    let models = manager.list_models(project.as_ref())?;
    if models.is_empty() {
        println!("No models found.");
        return Ok(());
    }

    if args.versions {
        let mut rows = Vec::new();
        for model in &models {
            for version in manager.list_versions(&model.id)? {
                rows.push(version_row(model, &version));
            }
        }
        print_table(
            &[
                "PROJECT", "NAME", "VERSION", "STATUS", "ACTIVE", "ENGINE", "TAG", "COMPLETED_AT",
                "ERROR",
            ],
            &rows,
        );
    } else {
        let rows: Vec<Vec<String>> = models.iter().map(model_row).collect();
        print_table(
            &["PROJECT", "NAME", "ENGINE", "ACTIVE", "LAST", "CREATED_AT"],
            &rows,
        );
    }
    Ok(())
}

/// Build training parameters from the command line. The CLI always waits:
/// training runs inside this process.
fn training_params(args: &ModelTrainArgs) -> TrainingParams {
    let mut params = TrainingParams {
        engine: args.engine.clone(),
        predict: args.predict.clone(),
        tag: args.tag.clone(),
        training_query: args.training_query.clone(),
        ..TrainingParams::default()
    };
    for (key, value) in &args.options {
        params = params.option(key, value);
    }
    if args.no_activate {
        params = params.active(false);
    }
    params.wait()
}

async fn train(ctx: &RuntimeContext, args: &ModelTrainArgs, retrain: bool) -> Result<()> {
    let id = model_id(ctx, args.project.as_deref(), &args.name)?;
    let params = training_params(args);
    let manager = ctx.engine.models();

    let version = if retrain {
        manager.retrain(&id, params).await
    } else {
        manager.create_model(&id, params).await
    }
    .with_context(|| format!("Training {} failed", id))?;

    let active = manager
        .get_model(&id)?
        .is_some_and(|m| m.is_active(version.version));
    println!(
        "{} version {} is {}{}",
        id,
        version.version,
        version.status,
        if active { " (active)" } else { "" }
    );
    Ok(())
}

async fn activate(ctx: &RuntimeContext, args: &ModelVersionArgs) -> Result<()> {
    let id = model_id(ctx, args.project.as_deref(), &args.name)?;
    ctx.engine
        .models()
        .activate(&id, args.version)
        .await
        .with_context(|| format!("Cannot activate {} version {}", id, args.version))?;
    println!("{} version {} is active", id, args.version);
    Ok(())
}

async fn delete_version(ctx: &RuntimeContext, args: &ModelVersionArgs) -> Result<()> {
    let id = model_id(ctx, args.project.as_deref(), &args.name)?;
    ctx.engine
        .models()
        .delete_version(&id, args.version)
        .await
        .with_context(|| format!("Cannot delete {} version {}", id, args.version))?;
    println!("Deleted {} version {}", id, args.version);
    Ok(())
}

async fn drop(ctx: &RuntimeContext, args: &ModelNameArgs) -> Result<()> {
    let id = model_id(ctx, args.project.as_deref(), &args.name)?;
    ctx.engine
        .models()
        .drop_model(&id)
        .await
        .with_context(|| format!("Cannot drop {}", id))?;
    println!("Dropped {}", id);
    Ok(())
}

fn model_row(model: &ModelRecord) -> Vec<String> {
    vec![
        model.id.project.to_string(),
        model.id.name.to_string(),
        model.engine.clone(),
        model
            .active_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string()),
        model.last_version.to_string(),
        format_timestamp(&model.created_at),
    ]
}

fn version_row(model: &ModelRecord, version: &ModelVersion) -> Vec<String> {
    vec![
        model.id.project.to_string(),
        model.id.name.to_string(),
        version.version.to_string(),
        version.status.to_string(),
        if model.is_active(version.version) {
            "yes".to_string()
        } else {
            String::new()
        },
        version.engine.clone(),
        version.tag.clone().unwrap_or_default(),
        format_optional_timestamp(version.completed_at.as_ref()),
        version.error.clone().unwrap_or_default(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_params_from_args() {
        let args = ModelTrainArgs {
            name: "m1".to_string(),
            project: None,
            predict: Some("amount".to_string()),
            engine: None,
            training_query: Some("SELECT * FROM files.orders".to_string()),
            tag: Some("first".to_string()),
            options: vec![("train_delay_ms".to_string(), "5".to_string())],
            no_activate: true,
        };
        let params = training_params(&args);
        assert_eq!(params.predict.as_deref(), Some("amount"));
        assert_eq!(params.tag.as_deref(), Some("first"));
        assert_eq!(params.options.get("train_delay_ms").map(String::as_str), Some("5"));
        assert_eq!(params.active, Some(false));
        assert!(params.wait);
        assert!(params.engine.is_none());
    }
}

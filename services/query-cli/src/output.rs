//! Rendering of engine results for the terminal.

use std::fmt::Write;

use anyhow::Result;
use clap::ValueEnum;
use serde_json::json;

use feature_query::{LayerFailure, Resolution, SearchOutcome, Selection, ViewFit};
use map_common::{Feature, Layer, LayerSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn render_layers(layers: &[Layer], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(layers)?);
    }

    let mut out = String::new();
    for layer in layers {
        writeln!(
            out,
            "{:<40} {:<30} {}",
            layer.id,
            layer.display_title(),
            layer.reference_system
        )?;
    }
    writeln!(out, "{} layer(s)", layers.len())?;
    Ok(out)
}

pub fn render_schema(schema: &LayerSchema, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(schema)?);
    }

    let mut out = String::new();
    for field in &schema.fields {
        let kind = serde_json::to_value(field.field_type)?;
        writeln!(out, "{:<30} {}", field.name, kind.as_str().unwrap_or_default())?;
    }
    if let Some(geometry) = &schema.geometry {
        writeln!(out, "geometry: {} ({})", geometry.name, geometry.type_token)?;
    }
    Ok(out)
}

pub fn render_resolution(resolution: &Resolution, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        let value = json!({
            "selection": &*resolution.selection,
            "committed": resolution.committed,
            "fit": &resolution.fit,
            "highlight": resolution.highlight.as_ref().map(|f| &f.id),
            "failures": failures_json(&resolution.failures),
        });
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let mut out = render_selection_text(&resolution.selection)?;
    if let Some(fit) = &resolution.fit {
        write_fit(&mut out, fit)?;
    }
    for failure in &resolution.failures {
        writeln!(
            out,
            "skipped {}: {}",
            failure.layer,
            failure.error.user_message()
        )?;
    }
    Ok(out)
}

pub fn render_search(outcome: &SearchOutcome, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        let value = match outcome {
            SearchOutcome::Results { selection, fit, .. } => json!({
                "message": outcome.message(),
                "selection": &**selection,
                "fit": fit,
            }),
            SearchOutcome::NoResults { criteria, .. } => json!({
                "message": outcome.message(),
                "criteria": criteria,
            }),
        };
        return Ok(serde_json::to_string_pretty(&value)?);
    }

    let mut out = String::new();
    writeln!(out, "{}", outcome.message())?;
    if let SearchOutcome::Results { selection, fit, .. } = outcome {
        out.push_str(&render_selection_text(selection)?);
        if let Some(fit) = fit {
            write_fit(&mut out, fit)?;
        }
    }
    Ok(out)
}

pub fn render_suggestions(values: &[String], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(values)?);
    }
    Ok(values.iter().map(|v| format!("{}\n", v)).collect())
}

fn render_selection_text(selection: &Selection) -> Result<String> {
    let mut out = String::new();
    if selection.is_empty() {
        writeln!(out, "No features selected")?;
        return Ok(out);
    }
    for feature in &selection.features {
        write_feature(&mut out, feature)?;
    }
    Ok(out)
}

fn write_feature(out: &mut String, feature: &Feature) -> Result<()> {
    let kind = feature
        .geometry
        .as_ref()
        .map(|g| format!("{:?}", g.kind()))
        .unwrap_or_else(|| "no geometry".to_string());
    writeln!(
        out,
        "{} [{}] {}",
        feature.id.as_deref().unwrap_or("(no id)"),
        feature.layer,
        kind
    )?;
    for (name, value) in feature.properties.iter() {
        writeln!(out, "  {}: {}", name, value)?;
    }
    Ok(())
}

fn write_fit(out: &mut String, fit: &ViewFit) -> Result<()> {
    writeln!(out, "fit: {} ({})", fit.extent.to_wms_string(), fit.crs)?;
    Ok(())
}

fn failures_json(failures: &[LayerFailure]) -> serde_json::Value {
    failures
        .iter()
        .map(|f| {
            json!({
                "layer": f.layer.qualified(),
                "kind": f.error.kind(),
                "message": f.error.user_message(),
            })
        })
        .collect()
}

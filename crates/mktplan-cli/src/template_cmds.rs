//! `mktplan template` subcommands.

use anyhow::{Context, Result, bail};
use uuid::Uuid;

use mktplan_core::context::AppContext;
use mktplan_core::stores::templates::{NewActivity, NewTemplate};
use mktplan_data::models::ActivityKind;

use crate::TemplateCommands;
use crate::resolve::resolve_id;

/// Fail the command when the store absorbed a persistence error.
fn check_store(ctx: &AppContext) -> Result<()> {
    if let Some(message) = ctx.templates.error() {
        bail!("{message}");
    }
    Ok(())
}

fn resolve_template(ctx: &AppContext, input: &str) -> Result<Uuid> {
    let ids: Vec<Uuid> = ctx.templates.templates().iter().map(|t| t.id).collect();
    resolve_id(input, &ids).context("unknown template")
}

fn resolve_activity(ctx: &AppContext, template_id: Uuid, input: &str) -> Result<Uuid> {
    let ids: Vec<Uuid> = ctx
        .templates
        .activities(template_id)
        .iter()
        .map(|a| a.id)
        .collect();
    resolve_id(input, &ids).context("unknown activity")
}

/// Run a template subcommand against the loaded context.
pub async fn run_template_command(command: TemplateCommands, ctx: &AppContext) -> Result<()> {
    match command {
        TemplateCommands::List => {
            let templates = ctx.templates.templates();
            if templates.is_empty() {
                println!("No templates found.");
                return Ok(());
            }
            println!(
                "{:<38} {:<30} {:<8} {:<7} {:>10}",
                "ID", "TITLE", "PUBLIC", "FIXED", "ACTIVITIES"
            );
            println!("{}", "-".repeat(98));
            for template in &templates {
                println!(
                    "{:<38} {:<30} {:<8} {:<7} {:>10}",
                    template.id,
                    template.title,
                    template.is_public,
                    template.fixed_activities,
                    ctx.templates.activities(template.id).len(),
                );
            }
        }
        TemplateCommands::Show { template_id } => {
            let id = resolve_template(ctx, &template_id)?;
            let template = ctx
                .templates
                .template(id)
                .with_context(|| format!("template {id} not found"))?;

            println!("Template: {} ({})", template.title, template.id);
            println!("Description: {}", template.description);
            println!("Strategy: {}", template.strategy);
            match template.company_id {
                Some(company) => println!("Company: {company}"),
                None => println!("Company: (global)"),
            }
            println!("Public: {}", template.is_public);
            println!("Fixed activities: {}", template.fixed_activities);
            println!(
                "Updated: {}",
                template.updated_at.format("%Y-%m-%d %H:%M")
            );
            println!();

            println!("Activities:");
            for activity in ctx.templates.activities(id) {
                let fixed_marker = if activity.fixed { "*" } else { " " };
                println!(
                    "  [{:>2}]{} {} ({}, {}d) {}",
                    activity.order_index,
                    fixed_marker,
                    activity.title,
                    activity.kind,
                    activity.duration_days,
                    activity.id,
                );
            }
        }
        TemplateCommands::Create {
            title,
            description,
            strategy,
            company,
            public,
            fixed,
        } => {
            let company_id = company
                .map(|c| Uuid::parse_str(&c).with_context(|| format!("invalid company id: {c}")))
                .transpose()?;

            let created = ctx
                .templates
                .create_template(NewTemplate {
                    title,
                    description: description.unwrap_or_default(),
                    strategy: strategy.unwrap_or_default(),
                    company_id,
                    is_public: public,
                    fixed_activities: fixed,
                })
                .await;
            check_store(ctx)?;
            if let Some(template) = created {
                println!("Created template {} ({})", template.title, template.id);
            }
        }
        TemplateCommands::AddActivity {
            template_id,
            title,
            kind,
            duration,
            order_index,
            description,
            has_form,
        } => {
            let id = resolve_template(ctx, &template_id)?;
            let kind: ActivityKind = kind
                .parse()
                .with_context(|| format!("invalid activity kind: {kind}"))?;

            let activity = ctx
                .templates
                .add_activity(
                    id,
                    NewActivity {
                        title,
                        description: description.unwrap_or_default(),
                        kind,
                        duration_days: duration,
                        order_index,
                        dependencies: vec![],
                        has_form,
                    },
                )
                .await?;
            println!(
                "Added activity {} ({}) at index {} (fixed: {})",
                activity.title, activity.id, activity.order_index, activity.fixed
            );
        }
        TemplateCommands::Reorder {
            template_id,
            activity_ids,
        } => {
            let id = resolve_template(ctx, &template_id)?;
            let ordered: Vec<Uuid> = activity_ids
                .iter()
                .map(|input| resolve_activity(ctx, id, input))
                .collect::<Result<_>>()?;

            ctx.templates.reorder_activities(id, ordered).await;
            check_store(ctx)?;

            println!("New order:");
            for activity in ctx.templates.activities(id) {
                println!("  [{:>2}] {}", activity.order_index, activity.title);
            }
        }
        TemplateCommands::ToggleFixed {
            template_id,
            activity_id,
        } => {
            let id = resolve_template(ctx, &template_id)?;
            let aid = resolve_activity(ctx, id, &activity_id)?;

            ctx.templates.toggle_activity_fixed(id, aid).await;
            check_store(ctx)?;

            let activity = ctx
                .templates
                .activities(id)
                .into_iter()
                .find(|a| a.id == aid)
                .with_context(|| format!("activity {aid} not found"))?;
            let template = ctx
                .templates
                .template(id)
                .with_context(|| format!("template {id} not found"))?;
            println!(
                "Activity {} fixed: {} (template flag: {})",
                activity.title, activity.fixed, template.fixed_activities
            );
        }
        TemplateCommands::SetFixed { template_id, fixed } => {
            let id = resolve_template(ctx, &template_id)?;
            ctx.templates.set_template_fixed_activities(id, fixed).await;
            check_store(ctx)?;
            println!("Template fixed_activities = {fixed}");
        }
        TemplateCommands::Delete { template_id } => {
            let id = resolve_template(ctx, &template_id)?;
            ctx.templates.delete_template(id).await;
            check_store(ctx)?;
            println!("Deleted template {id}.");
        }
    }

    Ok(())
}

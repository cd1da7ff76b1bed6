//! Export surface: the final campaign dossier, assembled from the
//! store's final-state assets and the full chat log.
//!
//! Packaging (zip/download) is the caller's concern; this module only
//! shapes the content.

use serde::Serialize;

use crate::generate::ProjectContext;
use crate::model::{AssetType, CanvasAsset, ChatMessage};
use crate::personas::display_name;

/// One formatted document inside the bundle.
#[derive(Debug, Clone, Serialize)]
pub struct BundleDocument {
    /// Slugged file stem, e.g. `we-knew-now-you-know`.
    pub slug: String,
    pub markdown: String,
}

/// The assembled campaign dossier.
#[derive(Debug, Clone, Serialize)]
pub struct ExportBundle {
    pub brief_markdown: String,
    pub manifesto: Option<BundleDocument>,
    pub messaging_framework: Option<BundleDocument>,
    pub ad_concepts: Vec<BundleDocument>,
    pub ooh_concepts: Vec<BundleDocument>,
    pub transcript: String,
    /// Raw final-state assets, for callers that package their own shapes.
    pub final_assets: Vec<CanvasAsset>,
    pub chat_log: Vec<ChatMessage>,
}

/// Lowercase, hyphenated file stem, capped at 50 characters.
pub fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
        if slug.len() >= 50 {
            break;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Markdown rendering of one exported asset.
pub fn format_asset_markdown(asset: &CanvasAsset) -> String {
    format!(
        "# {}\n\n**Type:** {}\n**Created by:** {}\n\n---\n\n{}\n",
        asset.title,
        asset.asset_type.label(),
        display_name(&asset.created_by),
        asset.content
    )
}

/// Plain-text transcript of the full chat log.
pub fn format_transcript(chat_log: &[ChatMessage]) -> String {
    let mut text = String::from("THE COLLECTIVE — COMMUNICATIONS TRANSCRIPT\n");
    text.push_str(&"=".repeat(60));
    text.push_str("\n\n");

    for message in chat_log {
        let name = display_name(&message.agent_id);
        let time = message.timestamp.format("%H:%M:%S");
        text.push_str(&format!("[{}] {}\n", time, name));
        text.push_str(&"-".repeat(name.len() + 11));
        text.push('\n');
        text.push_str(&message.content);
        text.push_str("\n\n");
    }

    text.push_str(&"=".repeat(60));
    text.push_str("\nALL OUTPUT IS THE PROPERTY OF THE VOID.\n");
    text
}

/// The campaign-brief document heading the bundle.
pub fn build_campaign_brief(context: &ProjectContext, final_assets: &[CanvasAsset]) -> String {
    let mut brief = format!(
        "# Campaign Brief\n## Proactive Apology Campaign for {}\n\n**Sector:** {}\n**Prepared by:** The Collective\n\n---\n\n## Selected Doomsday Scenarios\n\n",
        context.company.name,
        if context.company.sector.is_empty() {
            "Unknown"
        } else {
            &context.company.sector
        },
    );

    for scenario in &context.scenarios {
        brief.push_str(&format!(
            "### {}\n- **Probability:** {}%\n- **Severity:** {}/5\n- **Summary:** {}\n\n",
            scenario.title, scenario.probability, scenario.severity, scenario.summary
        ));
    }

    brief.push_str("---\n\n## Campaign Assets\n\n");
    for asset in final_assets {
        brief.push_str(&format!(
            "- **{}** ({}) — by {}\n",
            asset.title,
            asset.asset_type.label(),
            display_name(&asset.created_by)
        ));
    }

    brief.push_str(
        "\n---\n\nThe campaign anticipates potential crises and prepares authentic, \
         specific, and human messaging that can be deployed before external \
         pressure forces a reactive response.\n",
    );
    brief
}

/// Assemble the dossier from final assets and the chat log.
pub fn build_bundle(
    final_assets: Vec<CanvasAsset>,
    chat_log: Vec<ChatMessage>,
    context: &ProjectContext,
) -> ExportBundle {
    let document = |asset: &CanvasAsset| BundleDocument {
        slug: slugify(&asset.title),
        markdown: format_asset_markdown(asset),
    };

    // The most recent manifesto wins; the first framework wins
    let manifesto = final_assets
        .iter()
        .filter(|a| a.asset_type == AssetType::Manifesto)
        .next_back()
        .map(document);
    let messaging_framework = final_assets
        .iter()
        .find(|a| a.asset_type == AssetType::MessagingFramework)
        .map(document);
    let ad_concepts = final_assets
        .iter()
        .filter(|a| a.asset_type == AssetType::AdConcept)
        .map(document)
        .collect();
    let ooh_concepts = final_assets
        .iter()
        .filter(|a| a.asset_type == AssetType::OohMockup)
        .map(document)
        .collect();

    ExportBundle {
        brief_markdown: build_campaign_brief(context, &final_assets),
        manifesto,
        messaging_framework,
        ad_concepts,
        ooh_concepts,
        transcript: format_transcript(&chat_log),
        final_assets,
        chat_log,
    }
}

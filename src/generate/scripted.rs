//! Scripted fallback backend.
//!
//! Used when no generation service is configured. Responses come from
//! per-persona pools flavored with the live company and scenario, and
//! rotate with the conversation length so repeated runs don't read
//! identically. Chat replies are emitted word-by-word with a small
//! randomized delay to preserve the cadence of real streaming.

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use crate::errors::GenerationError;
use crate::model::{
    AssetType, ChatMessage, CompanyProfile, Horizon, Scenario, ScenarioSet,
};
use crate::personas::display_name;

use super::{
    AssetRequest, ChatRequest, CombineRequest, CombineSynthesis, DiscussionTurn, GeneratedAsset,
    GenerationBackend, ImageRequest, ImageResult, NewAssetData, ProjectContext, StreamChunk,
    TokenStream,
};

/// Inter-token delay range for fallback streams, before pacing scale.
const TOKEN_DELAY_MIN_MS: u64 = 25;
const TOKEN_DELAY_MAX_MS: u64 = 60;

/// Fallback backend producing scripted, context-flavored output.
pub struct ScriptedBackend {
    pacing_scale: f64,
}

impl ScriptedBackend {
    pub fn new(pacing_scale: f64) -> Self {
        Self { pacing_scale }
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn scenarios(&self, profile: &CompanyProfile) -> Result<ScenarioSet, GenerationError> {
        Ok(scripted_scenarios(&profile.name))
    }

    async fn asset(&self, request: AssetRequest) -> Result<GeneratedAsset, GenerationError> {
        Ok(scripted_asset(
            &request.persona_id,
            request.asset_type,
            &request.context,
        ))
    }

    async fn chat_stream(&self, request: ChatRequest) -> Result<TokenStream, GenerationError> {
        let reply = scripted_reply(&request.persona_id, &request.history, &request.context);
        let (tx, rx) = mpsc::channel(32);
        let scale = self.pacing_scale;

        tokio::spawn(async move {
            for (i, word) in reply.split_whitespace().enumerate() {
                let token = if i == 0 {
                    word.to_string()
                } else {
                    format!(" {}", word)
                };
                if tx.send(Ok(StreamChunk::Token(token))).await.is_err() {
                    return;
                }
                let jitter = rand::rng().random_range(TOKEN_DELAY_MIN_MS..=TOKEN_DELAY_MAX_MS);
                let delay = (jitter as f64 * scale) as u64;
                if delay > 0 {
                    sleep(Duration::from_millis(delay)).await;
                }
            }
            let _ = tx.send(Ok(StreamChunk::Done)).await;
        });

        Ok(rx)
    }

    async fn image(&self, _request: ImageRequest) -> ImageResult {
        // No image service in fallback mode
        ImageResult::default()
    }

    async fn combine(&self, request: CombineRequest) -> Result<CombineSynthesis, GenerationError> {
        let a = &request.asset_a;
        let b = &request.asset_b;
        Ok(CombineSynthesis {
            conversation: vec![
                DiscussionTurn {
                    agent_id: "boris".to_string(),
                    content: "These two ideas DEMAND to be united. The combination will be MAGNIFICENT.".to_string(),
                },
                DiscussionTurn {
                    agent_id: "gremlin".to_string(),
                    content: "ok yeah actually this works. the energy is right. dont overthink it.".to_string(),
                },
                DiscussionTurn {
                    agent_id: "comrade-pixel".to_string(),
                    content: "What if the merged piece starts where one ends and ends where the other begins. A loop. A promise.".to_string(),
                },
            ],
            new_asset: NewAssetData {
                asset_type: Some(a.asset_type),
                title: format!("{} × {}", a.title, b.title),
                content: format!(
                    "A synthesis of two ideas: the structural integrity of \"{}\" meets the creative vision of \"{}.\" The result is something neither could have been alone.",
                    a.title, b.title
                ),
            },
        })
    }
}

/// Pick a scripted chat reply for a persona.
///
/// A pure function of (persona, context, conversation length): the pool
/// index rotates with the message count, and reactive variants are
/// swapped in when a user or another persona spoke last.
pub fn scripted_reply(persona_id: &str, history: &[ChatMessage], ctx: &ProjectContext) -> String {
    let company = if ctx.company.name.is_empty() {
        "the company".to_string()
    } else {
        ctx.company.name.clone()
    };
    let scenario = ctx.scenario_label();

    let last_user = history.iter().rev().find(|m| m.is_from_user());
    let last_other = history
        .iter()
        .rev()
        .find(|m| !m.is_from_user() && m.agent_id != persona_id);
    let other_name = last_other
        .map(|m| display_name(&m.agent_id))
        .unwrap_or_else(|| "the room".to_string());

    let pool: Vec<String> = match persona_id {
        "nadia" => vec![
            format!("My models indicate that {company}'s exposure to \"{scenario}\" carries a 67% probability of materialization within the projected timeframe. We must calibrate the messaging accordingly."),
            format!("The data from comparable crises suggests {company} should lead with specificity. Vague contrition performs 41% worse than targeted accountability."),
            format!("The messaging framework needs to address three distinct audience segments for {company}. Each requires a different calibration of contrition."),
            if last_user.is_some() {
                format!("Your point is well-taken. The data supports a pivot in that direction. I will adjust the probability matrices for {company} accordingly.")
            } else {
                format!("Current campaign trajectory for {company} tracks well against crisis response benchmarks. Confidence: 0.82.")
            },
            if last_other.is_some() {
                format!("{other_name}'s observation aligns with my models, though I would note a 23% variance in the underlying assumption about {company}'s market position.")
            } else {
                format!("{company}'s risk profile suggests we frontload the remediation commitments. The data is unambiguous.")
            },
        ],
        "gremlin" => vec![
            format!("ok so the {company} color palette is wrong. not wrong-wrong but wrong in a way that feels dishonest. like the colors are trying too hard to say sorry."),
            format!("what if we stripped everything back for {company}. just black and white. the apology doesn't need decoration it needs oxygen."),
            format!("ok hear me out. what if the {company} billboard is just empty. like completely empty. and then the url at the bottom in 6pt type."),
            if last_user.is_some() {
                format!("wait actually. that idea you just said. what if we pushed it further for {company}. like way further.")
            } else {
                format!("the visual language for {company} needs to feel like a confession not a press release. raw paper. imperfect registration.")
            },
            if last_other.is_some() {
                format!("yeah what {other_name} said but more chaotic. {company} can handle it.")
            } else {
                format!("im thinking about texture for the {company} campaign. like literal texture. sandpaper ads. you have to feel it.")
            },
        ],
        "the-archivist" => vec![
            format!("For context: {company}'s sector has experienced 23 comparable crises since 2008. Only 4 companies survived with brand equity intact. The common factor was timing of disclosure."),
            format!("I have compiled a dossier of 12 historical parallels to \"{scenario}.\" The most instructive is the 2015 case. The parallels to {company} are remarkable."),
            format!("Historical note: every company that delayed its response to a comparable threat by more than 90 days experienced an average 47% increase in remediation costs. {company} should act decisively."),
            if last_user.is_some() {
                format!("To address your point: the historical record suggests that approach has been tried twice before in {company}'s sector. Once it succeeded. Once it did not. I can provide the details.")
            } else {
                format!("My research on {company}'s institutional history reveals patterns that should inform our creative approach. Footnote 34 is particularly relevant.")
            },
            if last_other.is_some() {
                format!("Building on what {other_name} suggested: the precedent for {company} actually supports an even more aggressive timeline. See footnote 89.")
            } else {
                format!("The historical context for {company} is critical. I have identified 7 inflection points that our campaign must address.")
            },
        ],
        "comrade-pixel" => vec![
            format!("What if the {company} manifesto starts not with an apology but with a question. \"What would you do if you knew?\" And then we answer it. Honestly."),
            format!("I have been writing the {company} headline for three hours. This version is the one. It sounds like the truth sounds when you finally say it out loud."),
            format!("What if \"{scenario}\" is not the crisis. What if the crisis is that {company} never said anything when they could have. The campaign writes itself from there."),
            if last_user.is_some() {
                format!("Your words just unlocked something. What if we built the entire {company} manifesto around that exact feeling. The feeling of finally saying the thing.")
            } else {
                format!("The voice of the {company} campaign should sound like a letter you write at 3am when you can't sleep because you know you owe someone the truth.")
            },
            if last_other.is_some() {
                format!("What {other_name} said. But softer. {company} needs tenderness here, not force. The wound is already open.")
            } else {
                format!("Every word in the {company} campaign must earn its place. I am editing ruthlessly. Iteration thirty-seven.")
            },
        ],
        // Boris also covers unknown persona ids
        _ => vec![
            format!("The {company} campaign demands ABSOLUTE conviction. \"{scenario}\" is not just a threat. It is our creative AMMUNITION."),
            format!("This is PRECISELY the kind of crisis that separates great campaigns from corporate wallpaper. {company} will thank us."),
            format!("We are not apologizing FOR {company}. We are teaching them HOW to apologize. There is a MAGNIFICENT difference."),
            if last_user.is_some() {
                format!("Your suggestion has MERIT. But let me refine it. {company} needs more FORCE behind the message. More conviction.")
            } else {
                format!("Every asset on this canvas must serve the narrative. {company}'s credibility depends on our precision.")
            },
            if last_other.is_some() {
                format!("I hear what {other_name} said, and I DISAGREE with the timidity. {company} needs BOLD action, not careful hedging.")
            } else {
                format!("The campaign for {company} is taking shape. I see the architecture of a truly MAGNIFICENT apology.")
            },
        ],
    };

    pool[history.len() % pool.len()].clone()
}

/// Scripted asset copy per (type, persona), flavored with the company.
pub fn scripted_asset(persona_id: &str, asset_type: AssetType, ctx: &ProjectContext) -> GeneratedAsset {
    let company = if ctx.company.name.is_empty() {
        "the company".to_string()
    } else {
        ctx.company.name.clone()
    };

    let (title, content): (String, String) = match asset_type {
        AssetType::TextCard => match persona_id {
            "nadia" => (
                "Scenario Analysis Summary".into(),
                format!("Primary threat vector for {company}: regulatory exposure at 73% probability within 18 months. Secondary: reputational contagion from supply chain dependencies. Recommended posture: pre-emptive transparency with quantified remediation commitments."),
            ),
            "the-archivist" => (
                "Historical Precedent File".into(),
                format!("Cross-reference analysis of 47 comparable corporate crises (1986-2024) reveals a consistent pattern: companies that issued proactive statements within the first 72 hours of crisis awareness experienced 34% less market cap erosion than those who waited. {company} should take note."),
            ),
            _ => (
                "Creative Brief: The Reckoning".into(),
                format!("This campaign will not whisper. It will DECLARE. {company}'s consumers deserve to know that we knew, and we chose to act before the world forced our hand."),
            ),
        },
        AssetType::AdConcept => match persona_id {
            "gremlin" => (
                "the quiet version".into(),
                "just the word \"sorry\" in 6pt type on a billboard. nothing else. maybe a color. probably red. the kind of red that makes you feel something before you read it.".into(),
            ),
            "comrade-pixel" => (
                "Before the Headlines".into(),
                format!("Hero line: \"Before the headlines wrote our story, we wanted to write it ourselves.\" A confession masquerading as an ad. CTA: \"{company} owes you more than this ad. Start here.\""),
            ),
            _ => (
                "We Knew. Now You Know.".into(),
                format!("Full-page print ad. Black background. White serif text, centered. No logo until the final line. Subhead: \"A letter to everyone {company} owes an explanation.\""),
            ),
        },
        AssetType::OohMockup => match persona_id {
            "gremlin" => (
                "the billboard that watches back".into(),
                "digital billboard. eye-level. it changes based on time of day. morning: \"good morning. we have something to tell you.\" evening: \"we're still here. still sorry.\"".into(),
            ),
            _ => (
                "Transit Authority: The Apology Posters".into(),
                "Series of 3 bus shelter posters. Each features a single statistic in large display type against stark black. Poster 1: \"4.2 million affected.\" Poster 2: \"847 days we waited.\" Poster 3: \"1 chance to make it right.\"".into(),
            ),
        },
        AssetType::MessagingFramework => (
            "Crisis Communications Framework v2.1".into(),
            format!("PRIMARY MESSAGE: {company} identified a systemic issue before it became a crisis. We are choosing transparency.\n\nKEY MESSAGES:\n1. We take full responsibility for the oversight.\n2. Affected stakeholders will receive direct communication within 48 hours.\n3. An independent review has been commissioned.\n4. Remediation is already underway.\n\nTONE: Sober, specific, human."),
        ),
        AssetType::Manifesto => (
            "A Letter to the Future We Nearly Destroyed".into(),
            "We built something magnificent.\nAnd in our magnificence, we forgot to look down.\n\nThis is not an apology designed by committee.\nThis is a confession written in the only language we know,\nthe language of what we should have said\nwhen the silence was still a choice.\n\nWe are not asking for forgiveness.\nWe are asking for the chance to earn\nthe right to ask for forgiveness.\n\nThis is the beginning.\nNot of a campaign.\nOf a correction.".into(),
        ),
        AssetType::StickyNote => match persona_id {
            "gremlin" => (
                "note".into(),
                "what if the whole thing is just one color. one word. one breath.".into(),
            ),
            "comrade-pixel" => (
                "note".into(),
                "What if we lead with the silence. The thing they didn't say. The press release they never sent.".into(),
            ),
            "the-archivist" => (
                "note".into(),
                "Reminder: similar campaign by BP in 2010 cost $93M. Our approach is more elegant and costs nothing.".into(),
            ),
            "nadia" => (
                "note".into(),
                "Contrition index is at 0.73. We need to increase specificity to reach the 0.85 threshold for credibility.".into(),
            ),
            _ => (
                "note".into(),
                "The headline needs more CONVICTION. This reads like an apology from a parking meter.".into(),
            ),
        },
    };

    GeneratedAsset { title, content }
}

/// Scripted doomsday scenarios across all four horizons.
pub fn scripted_scenarios(company_name: &str) -> ScenarioSet {
    let name = if company_name.is_empty() {
        "Unknown"
    } else {
        company_name
    };

    let scenario = |horizon: Horizon, index: usize, title: &str, probability: u8, severity: u8, summary: String| Scenario {
        id: format!("{}-{}", horizon.key(), index),
        title: title.to_string(),
        probability,
        severity,
        summary,
        horizon,
    };

    let mut horizons = std::collections::BTreeMap::new();
    horizons.insert(
        Horizon::OneYear,
        vec![
            scenario(Horizon::OneYear, 0, "The Regulatory Reckoning Begins", 72, 3,
                format!("A sweeping regulatory investigation reveals systemic compliance failures at {name}. Internal documents leak, showing executives were aware of the issues for years.")),
            scenario(Horizon::OneYear, 1, "The Data Breach That Ends Trust", 45, 4,
                format!("A sophisticated cyberattack exposes the personal data of millions of {name} users, revealing outdated security infrastructure and a culture of negligence.")),
        ],
    );
    horizons.insert(
        Horizon::FiveYear,
        vec![
            scenario(Horizon::FiveYear, 0, "The Platform Becomes the Prison", 65, 4,
                format!("{name}'s dominance invites aggressive antitrust action across multiple jurisdictions. Forced restructuring fundamentally alters the business model.")),
            scenario(Horizon::FiveYear, 1, "The Supply Chain Shatters", 48, 4,
                format!("Geopolitical tensions and climate disruptions devastate {name}'s global supply chain. Cost of goods triples and margins evaporate.")),
        ],
    );
    horizons.insert(
        Horizon::TenYear,
        vec![
            scenario(Horizon::TenYear, 0, "The AI Makes You Obsolete", 62, 5,
                format!("Open-source AI models eliminate the core value proposition of {name}. The market cap loses 80% of its value.")),
            scenario(Horizon::TenYear, 1, "The Climate Bill Comes Due", 70, 4,
                format!("Mandatory climate impact accounting reveals {name}'s true environmental cost. Carbon taxation consumes 35% of annual revenue.")),
        ],
    );
    horizons.insert(
        Horizon::FiftyYear,
        vec![
            scenario(Horizon::FiftyYear, 0, "The Brand Becomes a Warning", 75, 5,
                format!("{name} enters the lexicon as a synonym for corporate hubris. Children learn about it in history class alongside other cautionary tales.")),
            scenario(Horizon::FiftyYear, 1, "The Ocean Claims the Headquarters", 50, 5,
                format!("Rising sea levels render {name}'s physical infrastructure uninhabitable. The iconic headquarters becomes a diving attraction.")),
        ],
    );

    ScenarioSet {
        company: name.to_string(),
        horizons,
    }
}

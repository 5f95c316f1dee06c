//! Prompt text for each inference task
//!
//! Every prompt asks for JSON only and names the exact shape the caller will
//! decode; context records are embedded as JSON.

use serde::Serialize;
use wingman_common::models::{
    AspectProfile, MatchProfile, PartnerVirtue, UserIdentity, VirtueProfile,
};

fn context<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

pub fn quick_read() -> String {
    "These are the first screenshots of a dating profile. Reply with JSON only: \
     {\"name\": string|null, \"age\": number|null, \"app_source\": string|null, \
     \"zodiac_sign\": string|null}."
        .to_string()
}

/// Deep analysis, with a compatibility block requested when the user's synthesis is known
pub fn deep_analysis(identity: Option<&UserIdentity>) -> String {
    let mut prompt = String::from(
        "Analyze every screenshot of this dating profile. Reply with JSON only: \
         {\"name\", \"age\", \"app_source\", \
         \"photos\": [{\"index\", \"observations\", \"vibe\"}], \
         \"psychological_profile\": {\"summary\", \"traits\", \"attachment_style\"}, \
         \"prompts\": [{\"prompt\", \"answer\", \"insight\"}], \
         \"openers\": [{\"text\", \"rationale\"}]",
    );
    match identity.and_then(|i| i.synthesis.as_ref()) {
        Some(synthesis) => {
            prompt.push_str(
                ", \"compatibility\": {\"score\", \"summary\", \"green_flags\", \"red_flags\"}}. \
                 Score compatibility against this user: ",
            );
            prompt.push_str(&context(synthesis));
        }
        None => prompt.push('}'),
    }
    prompt
}

/// Partner-virtue scoring of a match (structured analysis or any stored analysis)
pub fn virtue_scoring<M: Serialize + ?Sized>(subject: &M, virtues: &[PartnerVirtue]) -> String {
    format!(
        "Score how strongly this match shows each partner virtue the user wants (0-10). \
         Reply with a JSON array only: [{{\"name\", \"score\", \"evidence\"}}]. \
         Virtues: {} Match: {}",
        context(virtues),
        context(subject)
    )
}

pub fn aspect_scoring<M: Serialize + ?Sized>(subject: &M, aspects: &AspectProfile) -> String {
    format!(
        "Score this match on each personality aspect of the user's profile (0-10). \
         Reply with JSON only: {{\"scores\": [{{\"aspect_id\", \"partner_score\", \"rationale\"}}], \
         \"overall_score\", \"summary\"}}. User aspects: {} Match: {}",
        context(aspects),
        context(subject)
    )
}

pub fn virtues11(profile: &MatchProfile, user: &VirtueProfile) -> String {
    format!(
        "Score this match on the 11 virtues and compare with the user's own scores. \
         Reply with JSON only: {{\"scores\": [{{\"virtue_id\", \"partner_score\", \"user_score\", \
         \"alignment\", \"evidence\"}}], \"overall_alignment\", \"summary\", \"generated_at\"}}. \
         alignment = 10 - |partner_score - user_score|. User: {} Match: {}",
        context(user),
        context(&profile.analysis)
    )
}

pub fn zodiac(user_sign: &str, partner_sign: &str) -> String {
    format!(
        "Describe the astrological compatibility of {} (user) and {} (match). \
         Reply with JSON only: {{\"user_sign\", \"partner_sign\", \"score\", \"summary\", \
         \"strengths\", \"challenges\"}}.",
        user_sign, partner_sign
    )
}

pub fn date_ideas(profile: &MatchProfile, identity: &UserIdentity) -> String {
    format!(
        "Suggest first-date ideas both people would enjoy. \
         Reply with JSON only: {{\"ideas\": [{{\"title\", \"description\", \"category\"}}]}}. \
         User: {} Match: {}",
        context(&identity.synthesis),
        context(&profile.analysis)
    )
}

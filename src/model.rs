use serde::{Deserialize, Deserializer, Serialize};

// ── Listing ──

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// One entry of a gallery page. `detail` is folded in by the merge step and
/// flattened on disk, so an enriched record is the key union of both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tagline: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub team_members: Vec<TeamMember>,
    #[serde(default)]
    pub likes: u32,
    #[serde(default)]
    pub comments: u32,
    #[serde(flatten)]
    pub detail: Option<ProjectDetail>,
}

impl ProjectSummary {
    /// Text fed to the track matcher: name, tagline and description.
    pub fn match_text(&self) -> String {
        let mut parts: Vec<&str> = vec![self.name.as_str()];
        if let Some(t) = &self.tagline {
            parts.push(t);
        }
        if let Some(d) = self.detail.as_ref().and_then(|d| d.full_description.as_deref()) {
            parts.push(d);
        }
        parts.join("\n")
    }
}

// ── Detail page ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedMember {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub prizes: Vec<String>,
}

/// Rich fields of a single project page. Every key is distinct from the
/// summary's keys so flattening never overwrites listing data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectDetail {
    pub title: Option<String>,
    pub full_description: Option<String>,
    pub technologies: Vec<String>,
    pub links: Vec<Link>,
    pub team_members_detailed: Vec<DetailedMember>,
    pub hackathon_submissions: Vec<Submission>,
}

/// A project page parsed from a saved snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedDetail {
    pub source_file: String,
    #[serde(flatten)]
    pub detail: ProjectDetail,
}

// ── Tracks ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub original_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prize_amount: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackSheet {
    pub hackathon_url: String,
    pub scraped_at: String,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMatch {
    pub track_name: String,
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMatches {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub matches: Vec<TrackMatch>,
}

// ── Prize matching ──

/// A `projects_data.json` record.
///
/// `matched_prize` is absent until the prize matcher has visited the record;
/// once visited it holds the prize text or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectContent {
    pub title: String,
    pub link: String,
    pub text: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub matched_prize: Option<Option<String>>,
}

impl ProjectContent {
    pub fn is_matched(&self) -> bool {
        self.matched_prize.is_some()
    }
}

/// A key that is present (even as `null`) deserializes to `Some`.
fn present<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summary_without_detail_has_no_detail_keys() {
        let s = ProjectSummary {
            name: "Moodboard".into(),
            url: Some("https://devpost.com/software/moodboard".into()),
            likes: 3,
            ..Default::default()
        };
        let v = serde_json::to_value(&s).unwrap();
        let obj = v.as_object().unwrap();
        assert!(!obj.contains_key("title"));
        assert!(!obj.contains_key("technologies"));
        assert_eq!(obj["likes"], 3);
    }

    #[test]
    fn detail_keys_are_flattened_into_summary() {
        let s = ProjectSummary {
            name: "Moodboard".into(),
            detail: Some(ProjectDetail {
                title: Some("Moodboard".into()),
                technologies: vec!["rust".into()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["technologies"], json!(["rust"]));
        assert_eq!(v["name"], "Moodboard");
    }

    #[test]
    fn matched_prize_null_differs_from_absent() {
        let visited: ProjectContent = serde_json::from_value(json!({
            "title": "a", "link": "l", "text": "t", "matched_prize": null
        }))
        .unwrap();
        let fresh: ProjectContent =
            serde_json::from_value(json!({ "title": "a", "link": "l", "text": "t" })).unwrap();
        assert_eq!(visited.matched_prize, Some(None));
        assert!(visited.is_matched());
        assert!(!fresh.is_matched());

        let v = serde_json::to_value(&visited).unwrap();
        assert!(v.as_object().unwrap().contains_key("matched_prize"));
        let v = serde_json::to_value(&fresh).unwrap();
        assert!(!v.as_object().unwrap().contains_key("matched_prize"));
    }
}

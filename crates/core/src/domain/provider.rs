use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub String);

/// A handyman on the fixed dispatch roster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    pub company: String,
    pub phone: String,
    pub rating: f32,
    #[serde(default)]
    pub services: Vec<String>,
}

impl Provider {
    /// Picks the roster service that best names the issue for the call script.
    pub fn service_type_for(&self, issue: &str) -> String {
        let issue = issue.to_ascii_lowercase();
        self.services
            .iter()
            .find(|service| issue.contains(&service.to_ascii_lowercase()))
            .or_else(|| self.services.first())
            .cloned()
            .unwrap_or_else(|| "General Repair".to_string())
    }

    pub fn snapshot(&self) -> ProviderSnapshot {
        ProviderSnapshot {
            provider_id: self.id.clone(),
            name: self.name.clone(),
            company: self.company.clone(),
            phone: self.phone.clone(),
            rating: self.rating,
        }
    }
}

/// Provider fields copied onto a quote at dispatch time so later roster edits do not
/// rewrite history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub provider_id: ProviderId,
    pub name: String,
    pub company: String,
    pub phone: String,
    pub rating: f32,
}

pub fn default_roster() -> Vec<Provider> {
    vec![
        Provider {
            id: ProviderId("h1".to_string()),
            name: "Joe".to_string(),
            company: "Joe's Plumbing".to_string(),
            phone: "+15550100101".to_string(),
            rating: 4.8,
            services: vec![
                "Plumbing".to_string(),
                "Leaks".to_string(),
                "Bathroom Fixtures".to_string(),
            ],
        },
        Provider {
            id: ProviderId("h2".to_string()),
            name: "Mike".to_string(),
            company: "A-1 Repairs".to_string(),
            phone: "+15550100102".to_string(),
            rating: 4.5,
            services: vec![
                "General Repairs".to_string(),
                "Carpentry".to_string(),
                "Electrical".to_string(),
            ],
        },
        Provider {
            id: ProviderId("h3".to_string()),
            name: "Sarah".to_string(),
            company: "Elite Handyman Services".to_string(),
            phone: "+15550100103".to_string(),
            rating: 4.9,
            services: vec![
                "Electrical".to_string(),
                "HVAC".to_string(),
                "Appliance Repair".to_string(),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::{default_roster, Provider, ProviderId};

    #[test]
    fn service_type_prefers_service_named_in_issue() {
        let roster = default_roster();
        assert_eq!(roster[1].service_type_for("Electrical outlet sparks"), "Electrical");
        assert_eq!(roster[0].service_type_for("Leaking faucet"), "Plumbing");
    }

    #[test]
    fn service_type_falls_back_to_general_repair() {
        let provider = Provider {
            id: ProviderId("x".to_string()),
            name: "X".to_string(),
            company: "X Co".to_string(),
            phone: "+15550000000".to_string(),
            rating: 4.0,
            services: Vec::new(),
        };
        assert_eq!(provider.service_type_for("anything"), "General Repair");
    }

    #[test]
    fn default_roster_has_unique_ids() {
        let roster = default_roster();
        let mut ids: Vec<_> = roster.iter().map(|p| p.id.0.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }
}

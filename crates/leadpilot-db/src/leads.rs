use chrono::Utc;
use leadpilot_core::error::{LeadPilotError, Result};
use leadpilot_core::traits::LeadStore;
use leadpilot_core::types::{
    Lead, LeadResearch, LeadScore, LeadSelection, NewLead, NewLeadResearch, NewLeadScore,
};
use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use crate::{Datastore, db_err};

const LEAD_COLUMNS: &str =
    "id, source_id, first_name, last_name, title, company, email, phone, crm_id, payload, created_at";

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        source_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        title: row.get(4)?,
        company: row.get(5)?,
        email: row.get(6)?,
        phone: row.get(7)?,
        crm_id: row.get(8)?,
        payload: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn score_from_row(row: &Row<'_>) -> rusqlite::Result<LeadScore> {
    Ok(LeadScore {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        crm_id: row.get(2)?,
        score: row.get(3)?,
        rationale: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn research_from_row(row: &Row<'_>) -> rusqlite::Result<LeadResearch> {
    Ok(LeadResearch {
        id: row.get(0)?,
        lead_id: row.get(1)?,
        summary_text: row.get(2)?,
        sources: row.get(3)?,
        created_at: row.get(4)?,
    })
}

impl LeadStore for Datastore {
    fn insert_lead(&self, lead: &NewLead) -> Result<Lead> {
        let stored = Lead {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: lead.source_id.clone(),
            first_name: lead.first_name.clone(),
            last_name: lead.last_name.clone(),
            title: lead.title.clone(),
            company: lead.company.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            crm_id: None,
            payload: lead.payload.clone(),
            created_at: Utc::now(),
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO leads_raw (id, source_id, first_name, last_name, title, company, email, phone, crm_id, payload, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9, ?10)",
            params![
                stored.id,
                stored.source_id,
                stored.first_name,
                stored.last_name,
                stored.title,
                stored.company,
                stored.email,
                stored.phone,
                stored.payload,
                stored.created_at,
            ],
        )
        .map_err(db_err("insert lead"))?;
        Ok(stored)
    }

    fn select_leads(&self, selection: &LeadSelection) -> Result<Vec<Lead>> {
        let (filter, ids): (String, Vec<&str>) = match selection {
            LeadSelection::Ids(ids) if ids.is_empty() => return Ok(Vec::new()),
            LeadSelection::Ids(ids) => {
                let marks = vec!["?"; ids.len()].join(", ");
                (
                    format!("WHERE id IN ({marks})"),
                    ids.iter().map(String::as_str).collect(),
                )
            }
            LeadSelection::Unlinked => ("WHERE crm_id IS NULL".to_string(), Vec::new()),
            LeadSelection::All => (String::new(), Vec::new()),
        };
        let sql =
            format!("SELECT {LEAD_COLUMNS} FROM leads_raw {filter} ORDER BY created_at, rowid");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(db_err("select leads"))?;
        let leads = stmt
            .query_map(params_from_iter(ids.iter()), lead_from_row)
            .map_err(db_err("select leads"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("read lead"))?;
        Ok(leads)
    }

    fn set_crm_id(&self, lead_id: &str, crm_id: &str) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE leads_raw SET crm_id = ?2 WHERE id = ?1",
                params![lead_id, crm_id],
            )
            .map_err(db_err("set crm id"))?;
        if changed == 0 {
            return Err(LeadPilotError::Database(format!("Lead not found: {lead_id}")));
        }
        Ok(())
    }

    fn unscored_leads(&self, linked_only: bool, limit: u32) -> Result<Vec<Lead>> {
        let linked = if linked_only { "AND l.crm_id IS NOT NULL" } else { "" };
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {LEAD_COLUMNS} FROM leads_raw l
                 WHERE NOT EXISTS (SELECT 1 FROM leads_scored s WHERE s.lead_id = l.id) {linked}
                 ORDER BY l.created_at, l.rowid
                 LIMIT ?1"
            ))
            .map_err(db_err("unscored leads"))?;
        let leads = stmt
            .query_map(params![limit], lead_from_row)
            .map_err(db_err("unscored leads"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("read lead"))?;
        Ok(leads)
    }

    fn insert_score(&self, score: &NewLeadScore) -> Result<LeadScore> {
        let stored = LeadScore {
            id: uuid::Uuid::new_v4().to_string(),
            lead_id: score.lead_id.clone(),
            crm_id: score.crm_id.clone(),
            score: score.score,
            rationale: score.rationale.clone(),
            created_at: Utc::now(),
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO leads_scored (id, lead_id, crm_id, score, rationale, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                stored.id,
                stored.lead_id,
                stored.crm_id,
                stored.score,
                stored.rationale,
                stored.created_at,
            ],
        )
        .map_err(db_err("insert score"))?;
        Ok(stored)
    }

    fn scores_for_lead(&self, lead_id: &str) -> Result<Vec<LeadScore>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, lead_id, crm_id, score, rationale, created_at
                 FROM leads_scored WHERE lead_id = ?1 ORDER BY created_at, rowid",
            )
            .map_err(db_err("scores"))?;
        let scores = stmt
            .query_map(params![lead_id], score_from_row)
            .map_err(db_err("scores"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("read score"))?;
        Ok(scores)
    }

    fn insert_research(&self, research: &NewLeadResearch) -> Result<LeadResearch> {
        let stored = LeadResearch {
            id: uuid::Uuid::new_v4().to_string(),
            lead_id: research.lead_id.clone(),
            summary_text: research.summary_text.clone(),
            sources: research.sources.clone(),
            created_at: Utc::now(),
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO lead_research (id, lead_id, summary_text, sources, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                stored.id,
                stored.lead_id,
                stored.summary_text,
                stored.sources,
                stored.created_at,
            ],
        )
        .map_err(db_err("insert research"))?;
        Ok(stored)
    }

    fn research_for_lead(&self, lead_id: &str) -> Result<Vec<LeadResearch>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, lead_id, summary_text, sources, created_at
                 FROM lead_research WHERE lead_id = ?1 ORDER BY created_at, rowid",
            )
            .map_err(db_err("research"))?;
        let rows = stmt
            .query_map(params![lead_id], research_from_row)
            .map_err(db_err("research"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("read research"))?;
        Ok(rows)
    }
}

impl Datastore {
    /// Fetch a single lead by id.
    pub fn get_lead(&self, lead_id: &str) -> Result<Option<Lead>> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {LEAD_COLUMNS} FROM leads_raw WHERE id = ?1"),
            params![lead_id],
            lead_from_row,
        )
        .optional()
        .map_err(db_err("get lead"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> Datastore {
        Datastore::open_in_memory().unwrap()
    }

    fn new_lead(email: Option<&str>) -> NewLead {
        NewLead {
            source_id: Some("zi-1".into()),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            company: Some("Engines Ltd".into()),
            email: email.map(String::from),
            payload: Some(json!({"id": "zi-1", "city": "London"})),
            ..NewLead::default()
        }
    }

    #[test]
    fn test_insert_and_get_lead() {
        let db = store();
        let lead = db.insert_lead(&new_lead(Some("ada@engines.io"))).unwrap();
        let loaded = db.get_lead(&lead.id).unwrap().unwrap();
        assert_eq!(loaded.email.as_deref(), Some("ada@engines.io"));
        assert_eq!(loaded.payload.unwrap()["city"], "London");
        assert!(loaded.crm_id.is_none());
        assert!(db.get_lead("missing").unwrap().is_none());
    }

    #[test]
    fn test_selection_modes() {
        let db = store();
        let a = db.insert_lead(&new_lead(Some("a@x.io"))).unwrap();
        let b = db.insert_lead(&new_lead(Some("b@x.io"))).unwrap();
        let c = db.insert_lead(&new_lead(None)).unwrap();
        db.set_crm_id(&b.id, "hs-2").unwrap();

        let all = db.select_leads(&LeadSelection::All).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, a.id);

        let unlinked: Vec<_> = db
            .select_leads(&LeadSelection::Unlinked)
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(unlinked, vec![a.id.clone(), c.id.clone()]);

        let picked = db
            .select_leads(&LeadSelection::Ids(vec![c.id.clone(), "nope".into()]))
            .unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].id, c.id);

        assert!(db.select_leads(&LeadSelection::Ids(vec![])).unwrap().is_empty());
    }

    #[test]
    fn test_set_crm_id_idempotent() {
        let db = store();
        let lead = db.insert_lead(&new_lead(Some("a@x.io"))).unwrap();
        db.set_crm_id(&lead.id, "hs-1").unwrap();
        db.set_crm_id(&lead.id, "hs-1").unwrap();
        assert_eq!(db.get_lead(&lead.id).unwrap().unwrap().crm_id.as_deref(), Some("hs-1"));

        assert!(db.set_crm_id("missing", "hs-1").is_err());
    }

    #[test]
    fn test_unscored_leads_respects_scores_and_limit() {
        let db = store();
        let a = db.insert_lead(&new_lead(Some("a@x.io"))).unwrap();
        let b = db.insert_lead(&new_lead(Some("b@x.io"))).unwrap();
        let c = db.insert_lead(&new_lead(Some("c@x.io"))).unwrap();

        db.insert_score(&NewLeadScore {
            lead_id: a.id.clone(),
            crm_id: None,
            score: 88.0,
            rationale: Some("great fit".into()),
        })
        .unwrap();

        let unscored: Vec<_> = db
            .unscored_leads(false, 10)
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(unscored, vec![b.id.clone(), c.id.clone()]);
        assert_eq!(db.unscored_leads(false, 1).unwrap().len(), 1);

        db.set_crm_id(&c.id, "hs-3").unwrap();
        let linked = db.unscored_leads(true, 10).unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id, c.id);

        let scores = db.scores_for_lead(&a.id).unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, 88.0);
    }

    #[test]
    fn test_research_roundtrip() {
        let db = store();
        let lead = db.insert_lead(&new_lead(Some("a@x.io"))).unwrap();
        db.insert_research(&NewLeadResearch {
            lead_id: lead.id.clone(),
            summary_text: Some("Expanding into Austin".into()),
            sources: Some(json!(["https://news.example/1"])),
        })
        .unwrap();

        let research = db.research_for_lead(&lead.id).unwrap();
        assert_eq!(research.len(), 1);
        assert_eq!(research[0].sources.as_ref().unwrap()[0], "https://news.example/1");
    }

    #[test]
    fn test_score_for_unknown_lead_rejected() {
        let db = store();
        let err = db
            .insert_score(&NewLeadScore {
                lead_id: "ghost".into(),
                crm_id: None,
                score: 10.0,
                rationale: None,
            })
            .unwrap_err();
        assert!(matches!(err, LeadPilotError::Database(_)));
    }
}

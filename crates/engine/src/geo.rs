//! Three-level geographic cascade (region → subregion → district).
//!
//! Selecting a level clears every level below it: values, errors, touched
//! flags and the option lists fetched for the old parent. Option lists are
//! fetched through an [`OptionsTicket`] and only applied while the parent
//! it was issued for is still selected.

use std::collections::BTreeMap;

use intake_gateway::{GatewayError, GeoArea, GeoCatalog};
use serde::Serialize;

/// Field names of the three levels in a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeoLevels {
    pub region: &'static str,
    pub subregion: &'static str,
    pub district: &'static str,
}

impl GeoLevels {
    pub fn fields(&self) -> [&'static str; 3] {
        [self.region, self.subregion, self.district]
    }

    pub fn field(&self, level: GeoLevel) -> &'static str {
        match level {
            GeoLevel::Region => self.region,
            GeoLevel::Subregion => self.subregion,
            GeoLevel::District => self.district,
        }
    }

    /// Level bound to a field name.
    pub fn level_of(&self, field: &str) -> Option<GeoLevel> {
        GeoLevel::ALL
            .into_iter()
            .find(|level| self.field(*level) == field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoLevel {
    Region,
    Subregion,
    District,
}

impl GeoLevel {
    pub const ALL: [GeoLevel; 3] = [GeoLevel::Region, GeoLevel::Subregion, GeoLevel::District];

    pub fn child(&self) -> Option<GeoLevel> {
        match self {
            GeoLevel::Region => Some(GeoLevel::Subregion),
            GeoLevel::Subregion => Some(GeoLevel::District),
            GeoLevel::District => None,
        }
    }

    pub fn parent(&self) -> Option<GeoLevel> {
        match self {
            GeoLevel::Region => None,
            GeoLevel::Subregion => Some(GeoLevel::Region),
            GeoLevel::District => Some(GeoLevel::Subregion),
        }
    }

    /// Every level strictly below this one, nearest first.
    pub fn descendants(&self) -> Vec<GeoLevel> {
        let mut out = Vec::new();
        let mut next = self.child();
        while let Some(level) = next {
            out.push(level);
            next = level.child();
        }
        out
    }
}

/// A request for the options of one level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionsTicket {
    pub level: GeoLevel,
    /// Selected parent id; `None` for regions.
    pub parent: Option<String>,
}

impl OptionsTicket {
    pub async fn execute(&self, catalog: &dyn GeoCatalog) -> Result<Vec<GeoArea>, GatewayError> {
        match (self.level, self.parent.as_deref()) {
            (GeoLevel::Region, _) => catalog.list_regions().await,
            (GeoLevel::Subregion, Some(region)) => catalog.list_subregions(region).await,
            (GeoLevel::District, Some(subregion)) => catalog.list_districts(subregion).await,
            (level, None) => Err(GatewayError::Backend(format!(
                "{level:?} options requested without a parent"
            ))),
        }
    }
}

/// Cached option lists of the cascade.
#[derive(Debug, Clone)]
pub struct GeoCascade {
    levels: GeoLevels,
    options: BTreeMap<GeoLevel, Vec<GeoArea>>,
}

impl GeoCascade {
    pub fn new(levels: GeoLevels) -> Self {
        GeoCascade {
            levels,
            options: BTreeMap::new(),
        }
    }

    pub fn levels(&self) -> &GeoLevels {
        &self.levels
    }

    pub fn options(&self, level: GeoLevel) -> &[GeoArea] {
        self.options.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ticket for the region list.
    pub fn load_regions(&self) -> OptionsTicket {
        OptionsTicket {
            level: GeoLevel::Region,
            parent: None,
        }
    }

    /// A level was set to `id` (or cleared when `None`).
    ///
    /// Drops the cached options of every descendant and returns the field
    /// names whose state the wizard must clear, plus a ticket for the child
    /// level's options.
    pub fn select(
        &mut self,
        level: GeoLevel,
        id: Option<&str>,
    ) -> (Vec<&'static str>, Option<OptionsTicket>) {
        let descendants = level.descendants();
        for d in &descendants {
            self.options.remove(d);
        }
        let cleared = descendants.iter().map(|d| self.levels.field(*d)).collect();
        let ticket = match (level.child(), id) {
            (Some(child), Some(id)) => Some(OptionsTicket {
                level: child,
                parent: Some(id.to_string()),
            }),
            _ => None,
        };
        (cleared, ticket)
    }

    /// Store fetched options. `current_parent` is the parent id selected
    /// right now; a ticket for any other parent is stale.
    pub fn complete(
        &mut self,
        ticket: &OptionsTicket,
        result: Result<Vec<GeoArea>, GatewayError>,
        current_parent: Option<&str>,
    ) -> bool {
        if ticket.level != GeoLevel::Region && ticket.parent.as_deref() != current_parent {
            tracing::debug!(level = ?ticket.level, "discarding stale option list");
            return false;
        }
        match result {
            Ok(areas) => {
                self.options.insert(ticket.level, areas);
            }
            Err(err) => {
                tracing::warn!(level = ?ticket.level, error = %err, "could not load options");
                self.options.remove(&ticket.level);
            }
        }
        true
    }

    pub fn reset(&mut self) {
        self.options.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_gateway::MemoryGateway;

    const LEVELS: GeoLevels = GeoLevels {
        region: "region",
        subregion: "subregion",
        district: "district",
    };

    fn gateway() -> MemoryGateway {
        MemoryGateway::new()
            .with_region(
                GeoArea::new("1", "Norte"),
                vec![GeoArea::new("1-1", "Upala"), GeoArea::new("1-2", "Guatuso")],
            )
            .with_region(GeoArea::new("2", "Sur"), vec![GeoArea::new("2-1", "Osa")])
            .with_districts("1-1", vec![GeoArea::new("1-1-1", "Aguas Claras")])
    }

    #[tokio::test]
    async fn selecting_a_region_clears_lower_levels() {
        let gw = gateway();
        let mut cascade = GeoCascade::new(LEVELS);

        let (_, ticket) = cascade.select(GeoLevel::Region, Some("1"));
        let ticket = ticket.unwrap();
        let subs = ticket.execute(&gw).await;
        assert!(cascade.complete(&ticket, subs, Some("1")));
        assert_eq!(cascade.options(GeoLevel::Subregion).len(), 2);

        let (_, ticket) = cascade.select(GeoLevel::Subregion, Some("1-1"));
        let districts = ticket.as_ref().unwrap().execute(&gw).await;
        cascade.complete(ticket.as_ref().unwrap(), districts, Some("1-1"));
        assert_eq!(cascade.options(GeoLevel::District).len(), 1);

        let (cleared, _) = cascade.select(GeoLevel::Region, Some("2"));
        assert_eq!(cleared, vec!["subregion", "district"]);
        assert!(cascade.options(GeoLevel::Subregion).is_empty());
        assert!(cascade.options(GeoLevel::District).is_empty());
    }

    #[tokio::test]
    async fn options_for_a_replaced_parent_are_dropped() {
        let gw = gateway();
        let mut cascade = GeoCascade::new(LEVELS);
        let (_, north) = cascade.select(GeoLevel::Region, Some("1"));
        let (_, south) = cascade.select(GeoLevel::Region, Some("2"));

        let north = north.unwrap();
        let late = north.execute(&gw).await;
        assert!(!cascade.complete(&north, late, Some("2")));

        let south = south.unwrap();
        let fresh = south.execute(&gw).await;
        assert!(cascade.complete(&south, fresh, Some("2")));
        assert_eq!(cascade.options(GeoLevel::Subregion), &[GeoArea::new("2-1", "Osa")]);
    }

    #[test]
    fn levels_map_to_fields() {
        assert_eq!(LEVELS.level_of("subregion"), Some(GeoLevel::Subregion));
        assert_eq!(LEVELS.level_of("farm_name"), None);
        assert_eq!(GeoLevel::Region.descendants(), vec![GeoLevel::Subregion, GeoLevel::District]);
        assert_eq!(GeoLevel::District.parent(), Some(GeoLevel::Subregion));
    }
}

//! Static campus → area → device layout.
//!
//! Loaded once from a JSON object; key order in the file is the display order.
//! A campus or area key that appears more than once is merged into its first
//! occurrence, so no device listed in the file is lost.

use std::{collections::HashSet, fmt, path::Path};

use indexmap::IndexMap;
use serde::{
    de::{MapAccess, Visitor},
    Deserialize, Deserializer, Serialize,
};

use crate::{
    domain::{DeviceId, Scope},
    Result,
};

pub type AreaDevices = IndexMap<DeviceId, String>;
pub type CampusAreas = IndexMap<String, AreaDevices>;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Topology {
    campuses: IndexMap<String, CampusAreas>,
}

/// Outcome of resolving a campus/area selection against the topology.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScopeLookup {
    Devices(Vec<DeviceId>),
    UnknownCampus(String),
    UnknownArea { campus: Option<String>, area: String },
}

impl Topology {
    pub fn from_json_str(txt: &str) -> Result<Self> {
        Ok(serde_json::from_str(txt)?)
    }

    /// Load the topology file. A missing or broken file yields an empty topology so
    /// the bot keeps serving (every query then reports no matching devices).
    pub fn load_or_empty(path: &Path) -> Self {
        let txt = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "topology file unreadable, using empty topology");
                return Self::default();
            }
        };

        match Self::from_json_str(&txt) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "topology file invalid, using empty topology");
                Self::default()
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.campuses.is_empty()
    }

    pub fn campus_names(&self) -> impl Iterator<Item = &str> {
        self.campuses.keys().map(String::as_str)
    }

    pub fn campus(&self, name: &str) -> Option<&CampusAreas> {
        self.campuses.get(name)
    }

    pub fn contains_device(&self, id: &DeviceId) -> bool {
        self.campuses
            .values()
            .flat_map(|areas| areas.values())
            .any(|devices| devices.contains_key(id))
    }

    /// Walk the topology in display order, restricted to the given scope.
    pub fn walk<'a>(
        &'a self,
        campus: &'a Scope,
        area: &'a Scope,
    ) -> impl Iterator<Item = (&'a str, &'a str, &'a AreaDevices)> + 'a {
        self.campuses
            .iter()
            .filter(move |(c, _)| campus.matches(c))
            .flat_map(move |(c, areas)| {
                areas
                    .iter()
                    .filter(move |(a, _)| area.matches(a))
                    .map(move |(a, devices)| (c.as_str(), a.as_str(), devices))
            })
    }

    /// Device ids under the scope, in display order. A device listed under several
    /// areas appears once, at its first position.
    pub fn lookup(&self, campus: &Scope, area: &Scope) -> ScopeLookup {
        if let Scope::Named(c) = campus {
            let Some(areas) = self.campuses.get(c) else {
                return ScopeLookup::UnknownCampus(c.clone());
            };
            if let Scope::Named(a) = area {
                if !areas.contains_key(a) {
                    return ScopeLookup::UnknownArea {
                        campus: Some(c.clone()),
                        area: a.clone(),
                    };
                }
            }
        } else if let Scope::Named(a) = area {
            let known = self.campuses.values().any(|areas| areas.contains_key(a));
            if !known {
                return ScopeLookup::UnknownArea {
                    campus: None,
                    area: a.clone(),
                };
            }
        }

        let mut seen = HashSet::new();
        let ids = self
            .walk(campus, area)
            .flat_map(|(_, _, devices)| devices.keys())
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();
        ScopeLookup::Devices(ids)
    }
}

fn merge_devices(into: &mut AreaDevices, from: AreaDevices) {
    for (id, name) in from {
        into.entry(id).or_insert(name);
    }
}

fn merge_areas(campus: &str, into: &mut CampusAreas, from: CampusAreas) {
    for (area, devices) in from {
        if into.contains_key(&area) {
            tracing::warn!(campus, area = %area, "repeated area in topology, merging devices");
        }
        merge_devices(into.entry(area).or_default(), devices);
    }
}

/// Area map of one campus, with repeated area keys folded together.
struct MergedAreas(CampusAreas);

impl<'de> Deserialize<'de> for MergedAreas {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct AreasVisitor;

        impl<'de> Visitor<'de> for AreasVisitor {
            type Value = MergedAreas;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of area name to devices")
            }

            fn visit_map<M>(self, mut access: M) -> std::result::Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut areas = CampusAreas::new();
                while let Some((area, devices)) = access.next_entry::<String, AreaDevices>()? {
                    let slot = areas.entry(area).or_default();
                    merge_devices(slot, devices);
                }
                Ok(MergedAreas(areas))
            }
        }

        deserializer.deserialize_map(AreasVisitor)
    }
}

impl<'de> Deserialize<'de> for Topology {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TopologyVisitor;

        impl<'de> Visitor<'de> for TopologyVisitor {
            type Value = Topology;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of campus name to areas")
            }

            fn visit_map<M>(self, mut access: M) -> std::result::Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let mut campuses: IndexMap<String, CampusAreas> = IndexMap::new();
                while let Some((campus, MergedAreas(areas))) =
                    access.next_entry::<String, MergedAreas>()?
                {
                    let slot = campuses.entry(campus.clone()).or_default();
                    merge_areas(&campus, slot, areas);
                }
                Ok(Topology { campuses })
            }
        }

        deserializer.deserialize_map(TopologyVisitor)
    }
}

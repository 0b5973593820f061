//! Translation from storefront location codes to courier area ids.
//!
//! The table is data, not code: [`AreaTable`] is read from the embedded
//! `resources/areas.toml` or from `shipping.area_table_path`, and
//! [`AreaMapper`] indexes it once for the configured [`AreaMode`].

use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::errors::ServiceError;

const EMBEDDED_AREAS: &str = include_str!("../../../resources/areas.toml");

/// Which courier environment the area ids are for.
///
/// Sandbox only knows city-level areas; production prefers district areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaMode {
    Sandbox,
    Production,
}

impl AreaMode {
    pub fn from_sandbox_flag(sandbox: bool) -> Self {
        if sandbox {
            AreaMode::Sandbox
        } else {
            AreaMode::Production
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AreaTable {
    #[serde(default)]
    pub cities: Vec<CityArea>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CityArea {
    pub code: String,
    pub name: String,
    pub area_id: String,
    #[serde(default)]
    pub districts: Vec<DistrictArea>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistrictArea {
    pub code: String,
    pub name: String,
    /// Falls back to the city area when absent
    #[serde(default)]
    pub area_id: Option<String>,
}

impl AreaTable {
    pub fn embedded() -> Result<Self, ServiceError> {
        Self::parse(EMBEDDED_AREAS)
    }

    pub fn parse(toml: &str) -> Result<Self, ServiceError> {
        Self::from_source(File::from_str(toml, FileFormat::Toml))
    }

    pub fn from_path(path: &Path) -> Result<Self, ServiceError> {
        Self::from_source(File::with_name(&path.to_string_lossy()).format(FileFormat::Toml))
    }

    fn from_source<S>(source: S) -> Result<Self, ServiceError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let table: AreaTable = Config::builder()
            .add_source(source)
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| ServiceError::InternalError(format!("invalid area table: {}", e)))?;
        table.check_codes()?;
        Ok(table)
    }

    /// Input codes must be unique across the whole table.
    fn check_codes(&self) -> Result<(), ServiceError> {
        let mut seen = HashSet::new();
        let codes = self.cities.iter().flat_map(|city| {
            std::iter::once(&city.code).chain(city.districts.iter().map(|d| &d.code))
        });
        for code in codes {
            if !seen.insert(code.as_str()) {
                return Err(ServiceError::InternalError(format!(
                    "invalid area table: duplicate code {}",
                    code
                )));
            }
        }
        Ok(())
    }
}

/// Resolves location codes to courier area ids and display names.
///
/// Resolution is idempotent: every area id the mapper produces resolves to
/// itself, and codes the table does not know pass through unchanged.
#[derive(Debug, Clone)]
pub struct AreaMapper {
    mode: AreaMode,
    area_ids: HashMap<String, String>,
    names: HashMap<String, String>,
}

impl AreaMapper {
    pub fn new(table: &AreaTable, mode: AreaMode) -> Self {
        let mut area_ids = HashMap::new();
        let mut names = HashMap::new();
        let mut produced = Vec::new();

        for city in &table.cities {
            area_ids.insert(city.code.clone(), city.area_id.clone());
            names.insert(city.code.clone(), city.name.clone());
            names.insert(city.area_id.clone(), city.name.clone());
            produced.push(city.area_id.clone());

            for district in &city.districts {
                let target = match (mode, &district.area_id) {
                    (AreaMode::Production, Some(area_id)) => area_id.clone(),
                    _ => city.area_id.clone(),
                };
                let label = format!("Kec. {}, {}", district.name, city.name);

                if target != city.area_id {
                    names.entry(target.clone()).or_insert_with(|| label.clone());
                }
                names.insert(district.code.clone(), label);
                area_ids.insert(district.code.clone(), target.clone());
                produced.push(target);
            }
        }

        // Produced ids map to themselves unless a code already claims them
        for area_id in produced {
            area_ids.entry(area_id.clone()).or_insert(area_id);
        }

        debug!(entries = area_ids.len(), ?mode, "area mapper indexed");
        Self {
            mode,
            area_ids,
            names,
        }
    }

    /// Builds a mapper from the configured table path or the embedded table.
    pub fn load(path: Option<&str>, mode: AreaMode) -> Result<Self, ServiceError> {
        let table = match path.filter(|p| !p.trim().is_empty()) {
            Some(path) => AreaTable::from_path(Path::new(path))?,
            None => AreaTable::embedded()?,
        };
        Ok(Self::new(&table, mode))
    }

    pub fn mode(&self) -> AreaMode {
        self.mode
    }

    pub fn resolve_area_id(&self, code: &str) -> String {
        self.area_ids
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }

    pub fn resolve_area_name(&self, code: &str) -> String {
        self.names
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mapper(mode: AreaMode) -> AreaMapper {
        AreaMapper::new(&AreaTable::embedded().unwrap(), mode)
    }

    #[rstest]
    #[case("6472030", "IDNP15IDNC383IDND4548")]
    #[case("6472040", "IDNP15IDNC383IDND4554")]
    #[case("6403040", "IDNP15IDNC210IDND1882")]
    #[case("IDNC383", "IDNC383")]
    #[case("IDNC386", "IDNC210")]
    #[case("6471020", "IDNC384")]
    #[case("3173090", "IDNC003")]
    #[case("3515180", "IDNC101")]
    fn production_prefers_district_areas(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(mapper(AreaMode::Production).resolve_area_id(code), expected);
    }

    #[rstest]
    #[case("6472030", "IDNC383")]
    #[case("6472100", "IDNC383")]
    #[case("IDNC386", "IDNC210")]
    #[case("6403010", "IDNC210")]
    #[case("6472220", "IDNC385")]
    fn sandbox_uses_city_areas(#[case] code: &str, #[case] expected: &str) {
        assert_eq!(mapper(AreaMode::Sandbox).resolve_area_id(code), expected);
    }

    #[test]
    fn unknown_codes_pass_through() {
        let mapper = mapper(AreaMode::Production);
        assert_eq!(mapper.resolve_area_id("9999999"), "9999999");
        assert_eq!(mapper.resolve_area_name("9999999"), "9999999");
    }

    #[test]
    fn resolution_is_idempotent() {
        for mode in [AreaMode::Sandbox, AreaMode::Production] {
            let mapper = mapper(mode);
            for code in ["6472010", "IDNC386", "3171040", "IDNC383", "6403070"] {
                let once = mapper.resolve_area_id(code);
                assert_eq!(mapper.resolve_area_id(&once), once, "{code} in {mode:?}");
            }
        }
    }

    #[test]
    fn names_cover_codes_and_area_ids() {
        let mapper = mapper(AreaMode::Production);
        assert_eq!(mapper.resolve_area_name("IDNC383"), "Samarinda");
        assert_eq!(
            mapper.resolve_area_name("6472030"),
            "Kec. Palaran, Samarinda"
        );
        assert_eq!(
            mapper.resolve_area_name("IDNP15IDNC383IDND4548"),
            "Kec. Palaran, Samarinda"
        );
        assert_eq!(mapper.resolve_area_name("IDNC210"), "Kutai Kartanegara");
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let toml = r#"
            [[cities]]
            code = "A"
            name = "Alpha"
            area_id = "AREA-A"
            districts = [{ code = "A", name = "Again" }]
        "#;
        assert!(AreaTable::parse(toml).is_err());
    }

    #[test]
    fn custom_table_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("areas.toml");
        std::fs::write(
            &path,
            r#"
            [[cities]]
            code = "C1"
            name = "Testville"
            area_id = "AREA-C1"
            districts = [{ code = "D1", name = "North", area_id = "AREA-D1" }]
            "#,
        )
        .unwrap();

        let mapper =
            AreaMapper::load(Some(path.to_str().unwrap()), AreaMode::Production).unwrap();
        assert_eq!(mapper.resolve_area_id("D1"), "AREA-D1");
        assert_eq!(mapper.resolve_area_name("D1"), "Kec. North, Testville");

        let sandbox = AreaMapper::load(Some(path.to_str().unwrap()), AreaMode::Sandbox).unwrap();
        assert_eq!(sandbox.resolve_area_id("D1"), "AREA-C1");
    }
}

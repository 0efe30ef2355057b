//! Full builds over small feed documents, queried through the lookup engine.

use std::fs;
use std::sync::Arc;

use indicatif::ProgressBar;
use tempfile::TempDir;

use addressok::build::{refresh, BuildPipeline, Refresh};
use addressok::config::BuildConfig;
use addressok::feed::FeedFiles;
use addressok::lookup::{AddressSelection, QueryEngine};
use addressok::store::{Dataset, SledStore};
use addressok::version::VersionManager;
use addressok::{AddressObject, ObjectId};

const ADDRESS_OBJECTS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<AddressObjects>
  <Object AOGUID="r16" FORMALNAME="Татарстан" OFFNAME="Татарстан" SHORTNAME="Респ" AOLEVEL="1" REGIONCODE="16" LIVESTATUS="1" ACTSTATUS="1"/>
  <Object AOGUID="r21" FORMALNAME="Чувашская Республика - Чувашия" SHORTNAME="Чувашия" AOLEVEL="1" REGIONCODE="21" LIVESTATUS="1" ACTSTATUS="1"/>
  <Object AOGUID="d-laishevo" PARENTGUID="r16" FORMALNAME="Лаишевский" SHORTNAME="р-н" AOLEVEL="3" REGIONCODE="16" POSTALCODE="422610" LIVESTATUS="1" ACTSTATUS="1"/>
  <Object AOGUID="d-cheb" PARENTGUID="r21" FORMALNAME="Чебоксарский" SHORTNAME="р-н" AOLEVEL="3" REGIONCODE="21" POSTALCODE="429500" LIVESTATUS="1" ACTSTATUS="1"/>
  <Object AOGUID="c-laishevo" PARENTGUID="d-laishevo" FORMALNAME="Лаишево" SHORTNAME="г" AOLEVEL="4" REGIONCODE="16" POSTALCODE="422610" LIVESTATUS="1" ACTSTATUS="1"/>
  <Object AOGUID="s-lenina" PARENTGUID="c-laishevo" FORMALNAME="Ленина" SHORTNAME="ул" AOLEVEL="7" REGIONCODE="16" POSTALCODE="422610" LIVESTATUS="1" ACTSTATUS="1"/>
  <Object AOGUID="s-vahitova" PARENTGUID="c-laishevo" FORMALNAME="Вахитова" SHORTNAME="ул" AOLEVEL="7" REGIONCODE="16" POSTALCODE="422610" LIVESTATUS="1" ACTSTATUS="1"/>
  <Object AOGUID="s-kirova" PARENTGUID="c-laishevo" FORMALNAME="Кирова" SHORTNAME="ул" AOLEVEL="7" REGIONCODE="16" LIVESTATUS="1" ACTSTATUS="1"/>
  <Object AOGUID="s-stroiteley" PARENTGUID="c-laishevo" FORMALNAME="Строителей 2-й" SHORTNAME="проезд" AOLEVEL="7" REGIONCODE="16" LIVESTATUS="1" ACTSTATUS="1"/>
  <Object AOGUID="s-old" PARENTGUID="c-laishevo" FORMALNAME="Старая" SHORTNAME="ул" AOLEVEL="7" REGIONCODE="16" POSTALCODE="422610" LIVESTATUS="0" ACTSTATUS="1"/>
</AddressObjects>"#;

const ABBREVIATIONS: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<AddressObjectTypes>
  <AddressObjectType LEVEL="1" SCNAME="Респ" SOCRNAME="Республика" KOD_T_ST="106"/>
  <AddressObjectType LEVEL="1" SCNAME="Чувашия" SOCRNAME="Чувашия" KOD_T_ST="107"/>
  <AddressObjectType LEVEL="3" SCNAME="р-н" SOCRNAME="Район" KOD_T_ST="301"/>
  <AddressObjectType LEVEL="4" SCNAME="г" SOCRNAME="Город" KOD_T_ST="401"/>
  <AddressObjectType LEVEL="7" SCNAME="ул" SOCRNAME="Улица" KOD_T_ST="729"/>
  <AddressObjectType LEVEL="7" SCNAME="проезд" SOCRNAME="Проезд" KOD_T_ST="718"/>
</AddressObjectTypes>"#;

fn config() -> BuildConfig {
    BuildConfig {
        batch_size: 3,
        ..Default::default()
    }
}

fn published() -> (Arc<SledStore>, QueryEngine<SledStore>) {
    let store = Arc::new(SledStore::temporary().unwrap());
    let versions = VersionManager::new(&*store);
    let handle = versions.start_build(1, "20240101").unwrap();

    let report = BuildPipeline::new(config())
        .unwrap()
        .run_sources(
            &versions.dataset(&handle),
            ADDRESS_OBJECTS.as_bytes(),
            ABBREVIATIONS.as_bytes(),
        )
        .unwrap();
    assert_eq!(report.objects_loaded, 9);
    assert_eq!(report.abbreviations_loaded, 6);
    assert_eq!(report.orphans, 0);
    assert_eq!(report.postal_codes, 2);
    assert_eq!(report.names_degraded, 0);

    versions.publish(handle).unwrap();
    let engine = QueryEngine::new(store.clone(), 64);
    (store, engine)
}

fn current(store: &SledStore) -> Dataset<'_, SledStore> {
    let version = VersionManager::new(store).current().unwrap().unwrap();
    Dataset::new(store, version.version)
}

fn find(store: &SledStore, guid: &str) -> AddressObject {
    current(store)
        .scan::<AddressObject>()
        .unwrap()
        .map(|o| o.unwrap())
        .find(|o| o.guid == guid)
        .unwrap_or_else(|| panic!("no object {}", guid))
}

fn id_of(store: &SledStore, guid: &str) -> ObjectId {
    find(store, guid).id
}

fn labels(entries: &[addressok::lookup::Entry]) -> Vec<&str> {
    entries.iter().map(|e| e.label.as_str()).collect()
}

#[test]
fn test_display_names() {
    let (store, _) = published();
    assert_eq!(find(&store, "r16").display_name, "Республика Татарстан");
    assert_eq!(find(&store, "r21").display_name, "Чувашская Республика");
    assert_eq!(find(&store, "d-laishevo").display_name, "Лаишевский р-н");
    assert_eq!(find(&store, "c-laishevo").display_name, "г. Лаишево");
    assert_eq!(find(&store, "s-lenina").display_name, "ул. Ленина");
    assert_eq!(find(&store, "s-stroiteley").display_name, "2-й проезд Строителей");
}

#[test]
fn test_parents_resolved_from_guids() {
    let (store, _) = published();
    let district = find(&store, "d-laishevo");
    assert_eq!(district.parent_id, id_of(&store, "r16"));
    assert_eq!(find(&store, "r16").parent_id, 0);
    assert!(current(&store)
        .scan::<AddressObject>()
        .unwrap()
        .all(|o| o.unwrap().guid != "s-old"));
}

#[test]
fn test_first_loaded_region_is_addressable() {
    let (store, engine) = published();
    let objects: Vec<AddressObject> = current(&store)
        .scan::<AddressObject>()
        .unwrap()
        .map(|o| o.unwrap())
        .collect();
    assert!(objects.iter().all(|o| o.id != 0));

    // r16 is the first element of the feed
    let region = id_of(&store, "r16");
    let response = engine.lookup(id_of(&store, "d-cheb"), "", None).unwrap();
    assert_eq!(response.filled.region.label, "Чувашская Республика");
    let response = engine.lookup(region, "", None).unwrap();
    assert_eq!(response.filled.region.id, region);
    assert_eq!(response.filled.district.label, "Лаишевский р-н");
}

#[test]
fn test_initial_response_lists_regions() {
    let (_store, engine) = published();
    let response = engine.lookup(0, "", None).unwrap();
    assert_eq!(
        labels(&response.suggestions.region),
        vec!["Республика Татарстан", "Чувашская Республика"]
    );
    assert!(response.filled.region.is_empty());
    assert!(response.filled.zip.is_empty());
}

#[test]
fn test_district_cascades_to_streets() {
    let (store, engine) = published();
    let response = engine
        .lookup(id_of(&store, "d-laishevo"), "", None)
        .unwrap();

    assert_eq!(response.filled.region.label, "Республика Татарстан");
    assert_eq!(response.filled.district.label, "Лаишевский р-н");
    // single place below the district is filled in
    assert_eq!(response.filled.place.label, "г. Лаишево");
    // every postal code under the district is the same one
    assert_eq!(response.filled.zip, "422610");
    assert_eq!(
        labels(&response.suggestions.street),
        vec![
            "ул. Вахитова",
            "ул. Кирова",
            "ул. Ленина",
            "2-й проезд Строителей"
        ]
    );
}

#[test]
fn test_zip_narrows_candidates() {
    let (store, engine) = published();
    let response = engine
        .lookup(id_of(&store, "c-laishevo"), "422610", None)
        .unwrap();
    assert_eq!(response.filled.zip, "422610");
    assert_eq!(
        labels(&response.suggestions.street),
        vec!["ул. Вахитова", "ул. Ленина"]
    );
}

#[test]
fn test_lookup_by_postal_code() {
    let (_store, engine) = published();
    let response = engine.lookup_by_postal_code("422610", None).unwrap();
    assert_eq!(response.filled.region.label, "Республика Татарстан");
    assert_eq!(response.filled.district.label, "Лаишевский р-н");
    assert_eq!(response.filled.place.label, "г. Лаишево");
    assert_eq!(
        labels(&response.suggestions.street),
        vec!["ул. Вахитова", "ул. Ленина"]
    );

    let dispatched = engine.lookup(0, "422610", None).unwrap();
    assert_eq!(dispatched, response);

    let unknown = engine.lookup_by_postal_code("000000", None).unwrap();
    assert_eq!(unknown.filled.zip, "000000");
    assert!(unknown.suggestions.is_empty());
}

#[test]
fn test_selection_uses_most_specific_field() {
    let (store, engine) = published();
    let selection = AddressSelection {
        region_id: id_of(&store, "r21"),
        district_id: id_of(&store, "d-cheb"),
        ..Default::default()
    };
    let response = engine.lookup_selection(&selection, None).unwrap();
    assert_eq!(response.filled.region.label, "Чувашская Республика");
    assert_eq!(response.filled.district.label, "Чебоксарский р-н");
    assert_eq!(response.filled.zip, "429500");
}

#[test]
fn test_postal_links_cover_ancestors() {
    let (store, _) = published();
    let dataset = current(&store);

    let objects: Vec<AddressObject> = dataset
        .scan::<AddressObject>()
        .unwrap()
        .map(|o| o.unwrap())
        .collect();
    for object in objects.iter().filter(|o| o.postal_code.is_some()) {
        let postal_id = dataset
            .postal_id(object.postal_code.as_deref().unwrap())
            .unwrap()
            .unwrap();

        let mut cursor = object.id;
        while cursor != 0 {
            assert!(
                dataset.is_linked(postal_id, cursor).unwrap(),
                "{} not linked to ancestor {} of {}",
                postal_id,
                cursor,
                object.guid
            );
            cursor = dataset.object(cursor).unwrap().unwrap().parent_id;
        }
    }

    let kirova = id_of(&store, "s-kirova");
    assert!(dataset.postal_ids_for(kirova).unwrap().is_empty());
}

#[test]
fn test_refresh_publishes_and_retires() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("AS_ADDROBJ_20240101_a.XML"), ADDRESS_OBJECTS).unwrap();
    fs::write(dir.path().join("AS_SOCRBASE_20240101_a.XML"), ABBREVIATIONS).unwrap();
    let feed = FeedFiles::discover(dir.path()).unwrap();
    let source_date = feed.source_date().unwrap();

    let store = Arc::new(SledStore::temporary().unwrap());
    let engine = QueryEngine::new(store.clone(), 64);
    assert!(engine.initial(None).is_err());

    let first = refresh(&*store, &config(), &feed, &source_date, false, ProgressBar::hidden())
        .unwrap();
    assert!(matches!(first, Refresh::Published { superseded: None, .. }));
    assert_eq!(engine.initial(None).unwrap().suggestions.region.len(), 2);

    let second = refresh(&*store, &config(), &feed, &source_date, true, ProgressBar::hidden())
        .unwrap();
    let Refresh::Published { version, superseded, .. } = second else {
        panic!("forced refresh did not publish");
    };
    assert_eq!(version.version, 2);
    assert_eq!(superseded, Some(1));

    let versions = VersionManager::new(&*store);
    assert_eq!(versions.previous().unwrap().unwrap().version, 1);
    versions.retire(1).unwrap();
    assert!(versions.previous().unwrap().is_none());
    assert_eq!(engine.initial(None).unwrap().suggestions.region.len(), 2);
}

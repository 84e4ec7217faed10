//! Network tests against live catalogs.
//!
//! All tests are `#[ignore]`. Run with:
//! `cargo test -p s2composite-cloud -- --ignored`

use std::time::Duration;

use chrono::NaiveDate;
use s2composite_cloud::{
    ArchiveQuery, BandMapping, CogReader, CogReaderOptions, HttpClient, ImageArchive,
    StacArchive, StacCatalog, StacClient, StacClientOptions, StacSearchParams,
};
use s2composite_core::{Band, GridLayout, Region, TimeWindow, CRS};

fn madrid() -> Region {
    Region::from_geojson_str(
        r#"{"type":"Polygon","coordinates":[[[-3.71,40.41],[-3.69,40.41],[-3.69,40.43],[-3.71,40.43],[-3.71,40.41]]]}"#,
    )
    .unwrap()
}

fn june_2024() -> TimeWindow {
    TimeWindow::new(
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
    )
    .unwrap()
}

#[tokio::test]
#[ignore]
async fn earth_search_returns_low_cloud_items() {
    let client = StacClient::new(StacCatalog::EarthSearch, StacClientOptions::default()).unwrap();
    let params = StacSearchParams::new()
        .bbox(-3.75, 40.38, -3.65, 40.45)
        .datetime("2024-06-01T00:00:00Z/2024-07-01T00:00:00Z")
        .collections(&["sentinel-2-l2a"])
        .max_cloud_cover(80.0)
        .limit(5);

    let page = client.search(&params).await.expect("search failed");
    assert!(!page.is_empty());
    for item in &page.features {
        assert!(item.cloud_cover().unwrap() < 80.0);
        assert!(item.asset("scl").is_some());
    }
}

#[tokio::test]
#[ignore]
async fn planetary_computer_signs_hrefs() {
    let client =
        StacClient::new(StacCatalog::PlanetaryComputer, StacClientOptions::default()).unwrap();
    let params = StacSearchParams::new()
        .bbox(-3.75, 40.38, -3.65, 40.45)
        .datetime("2024-06-01T00:00:00Z/2024-07-01T00:00:00Z")
        .collections(&["sentinel-2-l2a"])
        .limit(1);

    let page = client.search(&params).await.expect("search failed");
    let href = &page.features[0].asset("B04").unwrap().href;
    let signed = client.sign_asset_href(href).await.expect("signing failed");
    assert!(signed.contains('?'));
}

#[tokio::test]
#[ignore]
async fn scene_band_window_opens() {
    let client = StacClient::new(StacCatalog::EarthSearch, StacClientOptions::default()).unwrap();
    let http = HttpClient::new(Duration::from_secs(30)).unwrap();
    let archive = StacArchive::new(client, http.clone(), BandMapping::earth_search());

    let region = madrid();
    let window = june_2024();
    let query = ArchiveQuery {
        collection: "sentinel-2-l2a",
        region: &region,
        window: &window,
        max_cloud_cover: 80.0,
    };
    let scenes = archive.search(&query).await.expect("search failed");
    assert!(!scenes.is_empty());

    let red = scenes[0].assets.get("red").unwrap();
    let reader = CogReader::open(red, http, CogReaderOptions::default())
        .await
        .expect("open failed");
    assert!(reader.metadata().crs.is_projected());

    let utm = CRS::utm_for_lon_lat(-3.70, 40.42).unwrap();
    let (min_x, min_y, max_x, max_y) = {
        let (a, b) = CRS::wgs84().transform_point(&utm, -3.71, 40.41).unwrap();
        let (c, d) = CRS::wgs84().transform_point(&utm, -3.69, 40.43).unwrap();
        (a, b, c, d)
    };
    let layout = GridLayout::covering((min_x, min_y, max_x, max_y), utm, 5.0).unwrap();
    let image = archive
        .load_scene(&scenes[0], &[Band::Red, Band::Qa], &layout)
        .await
        .expect("load failed");
    assert_eq!(image.band(Band::Red).unwrap().shape(), layout.shape());
}

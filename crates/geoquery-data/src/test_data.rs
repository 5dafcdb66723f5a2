//! Deterministic synthetic datasets for tests, demos and benchmarks.
//!
//! The generated world is a small country with two cities. Springfield is
//! split across several detailed containers and holds a configurable number
//! of cafés spread around its center.

use tracing::info;

use crate::{
    categories::{Categories, types},
    container::{ContainerKind, InMemoryContainer, InMemoryContainerBuilder},
    country::StaticCountryInfo,
    error::Result,
    feature::{
        AddressInfo, ContainerId, FeatureClass, FeatureId, FeatureRecord, HouseRange, NameSet,
    },
    geometry::{Point, Rect},
    locale::LocaleCode,
};

pub const WORLD_CONTAINER: ContainerId = ContainerId(0);

/// Configuration for test data generation
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Number of cafés scattered around Springfield's center.
    pub cafes: usize,
    /// Number of detailed containers the city is split across.
    pub containers: u32,
    /// Distance of the closest café from the center, in metres.
    pub nearest_cafe_m: f64,
    /// Distance of the farthest café from the center, in metres.
    pub farthest_cafe_m: f64,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self {
            cafes: 250,
            containers: 2,
            nearest_cafe_m: 50.0,
            farthest_cafe_m: 8000.0,
        }
    }
}

impl TestDataConfig {
    /// Minimal data for unit tests
    pub fn minimal() -> Self {
        Self {
            cafes: 6,
            containers: 1,
            ..Self::default()
        }
    }
}

/// Expected placement of a generated café, for computing test oracles.
#[derive(Debug, Clone, PartialEq)]
pub struct CafeInfo {
    pub container: ContainerId,
    pub feature: FeatureId,
    pub rank: u8,
    pub center: Point,
}

/// Everything a test needs to drive the query core.
#[derive(Debug)]
pub struct TestWorld {
    pub springfield_center: Point,
    pub springfield_rect: Rect,
    pub shelbyville_center: Point,
    pub world: InMemoryContainer,
    pub countries: Vec<InMemoryContainer>,
    pub categories: Categories,
    pub country_info: StaticCountryInfo,
    pub cafes: Vec<CafeInfo>,
}

const CAFE_NAMES: &[&str] = &[
    "Aurora", "Bistro", "Central", "Dolce", "Espresso", "Flora", "Gusto", "Harbor", "Ivy",
    "Jasmine", "Kiosk", "Lumen", "Mocha", "Nova", "Olive", "Piazza",
];

fn point_feature(
    id: FeatureId,
    class: FeatureClass,
    names: NameSet,
    at: Point,
    types: Vec<u32>,
    min_scale: u8,
) -> FeatureRecord {
    FeatureRecord {
        id,
        class,
        names,
        center: at,
        rect: Rect::from_point(at),
        types,
        address: AddressInfo::default(),
        min_scale,
    }
}

fn area_feature(
    id: FeatureId,
    class: FeatureClass,
    names: NameSet,
    rect: Rect,
    types: Vec<u32>,
    min_scale: u8,
) -> FeatureRecord {
    FeatureRecord {
        id,
        class,
        names,
        center: rect.center(),
        rect,
        types,
        address: AddressInfo::default(),
        min_scale,
    }
}

/// A street running east from `start` for `length_m` metres.
fn street(
    id: FeatureId,
    name: &str,
    start: Point,
    length_m: f64,
    ranges: Vec<HouseRange>,
) -> FeatureRecord {
    let rect = Rect::new(start, start.offset_m(0.0, length_m));
    FeatureRecord {
        id,
        class: FeatureClass::Street,
        names: NameSet::native(name),
        center: rect.center(),
        rect,
        types: vec![types::STREET],
        address: AddressInfo {
            house_ranges: ranges,
            ..AddressInfo::default()
        },
        min_scale: 12,
    }
}

/// Generate the synthetic world described in the module docs.
pub fn generate_city(config: &TestDataConfig) -> Result<TestWorld> {
    info!("Creating test data with config: {:?}", config);

    let springfield_center = Point::new(45.0, 10.0);
    let springfield_rect = Rect::around(springfield_center, 9000.0);
    let shelbyville_center = springfield_center.offset_m(0.0, 40_000.0);
    let shelbyville_rect = Rect::around(shelbyville_center, 4000.0);
    let province_rect = springfield_rect.union(&shelbyville_rect).inflate_m(20_000.0);
    let country_rect = province_rect.inflate_m(200_000.0);

    let de = LocaleCode::from_tag("de").unwrap_or(LocaleCode::DEFAULT);
    let world = InMemoryContainer::builder(WORLD_CONTAINER, "World", ContainerKind::World)
        .bounds(Rect::world())
        .scales(0, 10)
        .feature(
            area_feature(
                0,
                FeatureClass::Country,
                NameSet::native("Freedonia"),
                country_rect,
                vec![types::COUNTRY],
                0,
            ),
            250,
        )
        .feature(
            area_feature(
                1,
                FeatureClass::Region,
                NameSet::native("North Province").with(de, "Nordprovinz"),
                province_rect,
                vec![types::REGION],
                2,
            ),
            220,
        )
        .feature(
            area_feature(
                2,
                FeatureClass::City,
                NameSet::native("Springfield").with(de, "Springfeld"),
                springfield_rect,
                vec![types::CITY],
                4,
            ),
            200,
        )
        .feature(
            area_feature(
                3,
                FeatureClass::City,
                NameSet::native("Shelbyville"),
                shelbyville_rect,
                vec![types::CITY],
                4,
            ),
            150,
        )
        .build()?;

    let containers = config.containers.max(1);
    let mut builders: Vec<InMemoryContainerBuilder> = (1..=containers)
        .map(|i| {
            InMemoryContainer::builder(
                ContainerId(i),
                format!("Freedonia part {i}"),
                ContainerKind::Country,
            )
            .scales(6, 17)
        })
        .collect();

    // Streets and buildings live in the first detailed container.
    {
        let b = &mut builders[0];
        let main_start = springfield_center.offset_m(200.0, -500.0);
        b.push(street(0, "Main Street", main_start, 1000.0, Vec::new()), 60);
        let oak_start = springfield_center.offset_m(-400.0, -300.0);
        let oak_ranges = vec![HouseRange { from: 1, to: 99 }];
        b.push(street(1, "Oak Avenue", oak_start, 800.0, oak_ranges), 50);
        let elm_start = springfield_center.offset_m(900.0, 0.0);
        b.push(street(2, "Elm Road", elm_start, 600.0, Vec::new()), 40);
        let shelbyville_main = shelbyville_center.offset_m(100.0, -300.0);
        b.push(street(3, "Main Street", shelbyville_main, 700.0, Vec::new()), 30);

        let mut building = point_feature(
            4,
            FeatureClass::Building,
            NameSet::new(),
            springfield_center.offset_m(-400.0, -180.0),
            vec![types::BUILDING],
            16,
        );
        building.address = AddressInfo {
            street: Some(1),
            house_number: Some("12".to_string()),
            house_ranges: Vec::new(),
        };
        b.push(building, 0);

        let mut museum = point_feature(
            5,
            FeatureClass::Poi,
            NameSet::native("City Museum").with(de, "Stadtmuseum"),
            springfield_center.offset_m(150.0, 150.0),
            vec![types::MUSEUM],
            12,
        );
        museum.address.street = Some(0);
        b.push(museum, 90);
    }

    let mut cafes = Vec::with_capacity(config.cafes);
    let span = (config.farthest_cafe_m - config.nearest_cafe_m).max(0.0);
    let steps = config.cafes.saturating_sub(1).max(1) as f64;
    for i in 0..config.cafes {
        let container_idx = i % containers as usize;
        let b = &mut builders[container_idx];
        let distance = config.nearest_cafe_m + span * (i as f64) / steps;
        // Golden-angle spiral keeps the cafés spread in every direction.
        let angle = (i as f64) * 2.399_963;
        let at = springfield_center.offset_m(distance * angle.sin(), distance * angle.cos());
        let rank = 10 + ((i * 37) % 81) as u8;
        let id = b.next_id();
        let name = format!("Cafe {}", CAFE_NAMES[i % CAFE_NAMES.len()]);
        b.push(
            point_feature(id, FeatureClass::Poi, NameSet::native(name), at, vec![types::CAFE], 14),
            rank,
        );
        cafes.push(CafeInfo {
            container: ContainerId(container_idx as u32 + 1),
            feature: id,
            rank,
            center: at,
        });
    }

    let countries = builders
        .into_iter()
        .map(InMemoryContainerBuilder::build)
        .collect::<Result<Vec<_>>>()?;

    let country_info = StaticCountryInfo::default()
        .with_region("Freedonia", country_rect)
        .with_region("North Province, Freedonia", province_rect);

    Ok(TestWorld {
        springfield_center,
        springfield_rect,
        shelbyville_center,
        world,
        countries,
        categories: Categories::bundled(),
        country_info,
        cafes,
    })
}

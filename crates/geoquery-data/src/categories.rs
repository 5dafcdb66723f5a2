//! Category taxonomy: type codes and their localized names.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    feature::TypeCode,
    locale::LocaleCode,
    normalize::{normalize, split_words},
};

/// Well-known type codes used by the bundled taxonomy and the test fixtures.
pub mod types {
    use crate::feature::TypeCode;

    pub const CAFE: TypeCode = 1;
    pub const RESTAURANT: TypeCode = 2;
    pub const HOTEL: TypeCode = 3;
    pub const PHARMACY: TypeCode = 4;
    pub const FUEL: TypeCode = 5;
    pub const ATM: TypeCode = 6;
    pub const HOSPITAL: TypeCode = 7;
    pub const SUPERMARKET: TypeCode = 8;
    pub const MUSEUM: TypeCode = 9;
    pub const PARKING: TypeCode = 10;
    pub const STREET: TypeCode = 100;
    pub const BUILDING: TypeCode = 101;
    pub const CITY: TypeCode = 200;
    pub const REGION: TypeCode = 201;
    pub const COUNTRY: TypeCode = 202;
}

/// One localized name of a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryName {
    pub locale: LocaleCode,
    pub name: String,
    /// Minimal typed prefix length before this name is offered as a suggestion.
    pub min_prefix_len: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub types: Vec<TypeCode>,
    pub names: Vec<CategoryName>,
}

/// Read access to the category taxonomy.
pub trait CategoryTaxonomy: fmt::Debug + Send + Sync {
    /// Type codes whose name in one of `locales` contains `token` as a word
    /// (or as a word prefix when `prefix` is set).
    fn types_for_token(&self, token: &str, prefix: bool, locales: &[LocaleCode]) -> Vec<TypeCode>;

    /// Every category name in `locale`, for suggestions.
    fn names_in(&self, locale: LocaleCode) -> Vec<CategoryName>;

    /// Display name for a type code.
    fn type_name(&self, code: TypeCode, locale: LocaleCode) -> Option<String>;
}

/// An in-memory taxonomy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Categories {
    categories: Vec<Category>,
}

impl Categories {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn push(&mut self, category: Category) {
        self.categories.push(category);
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// The bundled taxonomy of everyday categories in a few languages.
    pub fn bundled() -> Self {
        let en = LocaleCode::ENGLISH;
        let de = LocaleCode::from_tag("de").unwrap_or(LocaleCode::DEFAULT);
        let ru = LocaleCode::from_tag("ru").unwrap_or(LocaleCode::DEFAULT);
        let entries: &[(TypeCode, &[(LocaleCode, &str)])] = &[
            (types::CAFE, &[(en, "Cafe"), (de, "Café"), (ru, "Кафе")]),
            (
                types::RESTAURANT,
                &[(en, "Restaurant"), (de, "Restaurant"), (ru, "Ресторан")],
            ),
            (types::HOTEL, &[(en, "Hotel"), (de, "Hotel"), (ru, "Гостиница")]),
            (types::PHARMACY, &[(en, "Pharmacy"), (de, "Apotheke"), (ru, "Аптека")]),
            (types::FUEL, &[(en, "Gas station"), (de, "Tankstelle"), (ru, "Заправка")]),
            (types::ATM, &[(en, "ATM"), (de, "Geldautomat"), (ru, "Банкомат")]),
            (types::HOSPITAL, &[(en, "Hospital"), (de, "Krankenhaus"), (ru, "Больница")]),
            (
                types::SUPERMARKET,
                &[(en, "Supermarket"), (de, "Supermarkt"), (ru, "Супермаркет")],
            ),
            (types::MUSEUM, &[(en, "Museum"), (de, "Museum"), (ru, "Музей")]),
            (types::PARKING, &[(en, "Parking"), (de, "Parkplatz"), (ru, "Парковка")]),
        ];
        let categories = entries
            .iter()
            .map(|(code, names)| Category {
                types: vec![*code],
                names: names
                    .iter()
                    .map(|(locale, name)| CategoryName {
                        locale: *locale,
                        name: (*name).to_string(),
                        min_prefix_len: 0,
                    })
                    .collect(),
            })
            .collect();
        Self { categories }
    }
}

impl CategoryTaxonomy for Categories {
    fn types_for_token(&self, token: &str, prefix: bool, locales: &[LocaleCode]) -> Vec<TypeCode> {
        let token = normalize(token);
        if token.is_empty() {
            return Vec::new();
        }
        let mut out: Vec<TypeCode> = self
            .categories
            .iter()
            .filter(|cat| {
                cat.names
                    .iter()
                    .filter(|n| locales.contains(&n.locale))
                    .flat_map(|n| split_words(&n.name))
                    .any(|w| w == token || (prefix && w.starts_with(&token)))
            })
            .flat_map(|cat| cat.types.iter().copied())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn names_in(&self, locale: LocaleCode) -> Vec<CategoryName> {
        self.categories
            .iter()
            .flat_map(|cat| cat.names.iter())
            .filter(|n| n.locale == locale)
            .cloned()
            .collect()
    }

    fn type_name(&self, code: TypeCode, locale: LocaleCode) -> Option<String> {
        let category = self.categories.iter().find(|c| c.types.contains(&code))?;
        category
            .names
            .iter()
            .find(|n| n.locale == locale)
            .or_else(|| category.names.first())
            .map(|n| n.name.clone())
    }
}

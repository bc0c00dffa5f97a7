//! OpenHolidays source
//!
//! Public holidays per country and day from <https://openholidaysapi.org>.
//! The API is open, so there is no authentication step.

use super::select_fields;
use crate::config::Parameter;
use crate::error::{Error, Result};
use crate::runtime::FetchRequest;
use crate::schema::{FieldType, NodeSchema};
use crate::source::{BatchReady, FetchContext, Source};
use crate::types::{JsonValue, Row};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

pub const OPEN_HOLIDAYS_API_URL: &str = "https://openholidaysapi.org";

const COUNTRY_ISO_CODE: &str = "CountryIsoCode";
const LANGUAGE_ISO_CODE: &str = "LanguageIsoCode";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalizedText {
    language: String,
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Holiday {
    id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: Vec<LocalizedText>,
    #[serde(default)]
    nationwide: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Country {
    iso_code: String,
    #[serde(default)]
    name: Vec<LocalizedText>,
    #[serde(default)]
    official_languages: Vec<String>,
}

/// Text in `language`, falling back to the first translation
fn localized(texts: &[LocalizedText], language: &str) -> Option<String> {
    texts
        .iter()
        .find(|t| t.language.eq_ignore_ascii_case(language))
        .or_else(|| texts.first())
        .map(|t| t.text.clone())
}

/// OpenHolidays API source
#[derive(Debug, Clone)]
pub struct OpenHolidaysSource {
    base_url: String,
    schemas: Vec<NodeSchema>,
}

impl Default for OpenHolidaysSource {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenHolidaysSource {
    pub fn new() -> Self {
        Self {
            base_url: OPEN_HOLIDAYS_API_URL.to_string(),
            schemas: schemas(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn language(ctx: &FetchContext<'_>) -> String {
        ctx.config
            .string(LANGUAGE_ISO_CODE)
            .unwrap_or("EN")
            .to_uppercase()
    }

    fn schema(&self, node: &str) -> Result<&NodeSchema> {
        self.node_schema(node)
            .ok_or_else(|| Error::schema(node, "Unknown OpenHolidays node"))
    }
}

#[async_trait]
impl Source for OpenHolidaysSource {
    fn name(&self) -> &str {
        "open-holidays"
    }

    fn parameters(&self) -> Vec<(String, Parameter)> {
        vec![
            (
                format!("{COUNTRY_ISO_CODE}*"),
                Parameter::new()
                    .required_type("string")
                    .default_value("DE")
                    .label("Country ISO Code")
                    .description("ISO 3166-1 code of the country to import holidays for"),
            ),
            (
                LANGUAGE_ISO_CODE.to_string(),
                Parameter::new()
                    .required_type("string")
                    .default_value("EN")
                    .label("Language ISO Code")
                    .description("Language of holiday and country names"),
            ),
        ]
    }

    fn schemas(&self) -> &[NodeSchema] {
        &self.schemas
    }

    async fn fetch_catalog(
        &self,
        ctx: &FetchContext<'_>,
        _on_batch_ready: &mut dyn BatchReady,
    ) -> Result<Vec<Row>> {
        let schema = self.schema(ctx.node)?;
        if ctx.node != "countries" {
            return Err(Error::schema(ctx.node, "Not an OpenHolidays catalog node"));
        }

        let language = Self::language(ctx);
        let request = FetchRequest::get(format!("{}/Countries", self.base_url))
            .header("Accept", "application/json")
            .query("languageIsoCode", &language);
        let countries: Vec<Country> = ctx
            .runtime
            .fetch(request)
            .await?
            .error_for_status()?
            .json()?;

        Ok(countries
            .into_iter()
            .map(|country| {
                let mut row = Row::new();
                row.insert(
                    "name".to_string(),
                    localized(&country.name, &language).map_or(JsonValue::Null, JsonValue::from),
                );
                row.insert("isoCode".to_string(), JsonValue::from(country.iso_code));
                row.insert(
                    "officialLanguages".to_string(),
                    JsonValue::from(country.official_languages),
                );
                select_fields(row, schema, ctx.fields)
            })
            .collect())
    }

    async fn fetch_time_series_day(
        &self,
        ctx: &FetchContext<'_>,
        day: NaiveDate,
    ) -> Result<Vec<Row>> {
        let schema = self.schema(ctx.node)?;
        if ctx.node != "publicHolidays" {
            return Err(Error::schema(ctx.node, "Not an OpenHolidays time-series node"));
        }

        let country = ctx
            .config
            .string(COUNTRY_ISO_CODE)
            .ok_or_else(|| Error::configuration(COUNTRY_ISO_CODE, "Country code is required"))?
            .to_uppercase();
        let language = Self::language(ctx);
        let date = ctx.runtime.format_date(day);

        let request = FetchRequest::get(format!("{}/PublicHolidays", self.base_url))
            .header("Accept", "application/json")
            .query("countryIsoCode", &country)
            .query("languageIsoCode", &language)
            .query("validFrom", &date)
            .query("validTo", &date);
        let holidays: Vec<Holiday> = ctx
            .runtime
            .fetch(request)
            .await?
            .error_for_status()?
            .json()?;

        Ok(holidays
            .into_iter()
            .filter(|holiday| holiday.start_date <= day && day <= holiday.end_date)
            .map(|holiday| {
                let mut row = Row::new();
                row.insert("id".to_string(), JsonValue::from(holiday.id));
                row.insert("date".to_string(), JsonValue::from(date.clone()));
                row.insert(
                    "name".to_string(),
                    localized(&holiday.name, &language).map_or(JsonValue::Null, JsonValue::from),
                );
                row.insert("type".to_string(), JsonValue::from(holiday.kind));
                row.insert("nationwide".to_string(), JsonValue::from(holiday.nationwide));
                row.insert("country".to_string(), JsonValue::from(country.clone()));
                select_fields(row, schema, ctx.fields)
            })
            .collect())
    }
}

fn schemas() -> Vec<NodeSchema> {
    vec![
        NodeSchema::new("publicHolidays")
            .description("Public holidays observed on each day")
            .documentation("https://openholidaysapi.org/swagger/index.html")
            .field("id", FieldType::String)
            .field("date", FieldType::Date)
            .field("name", FieldType::String)
            .field("type", FieldType::String)
            .field("nationwide", FieldType::Boolean)
            .field("country", FieldType::String)
            .unique_keys(["id", "date"])
            .time_series()
            .destination_name("open_holidays_public_holidays"),
        NodeSchema::new("countries")
            .description("Countries supported by the API")
            .documentation("https://openholidaysapi.org/swagger/index.html")
            .field("isoCode", FieldType::String)
            .field("name", FieldType::String)
            .field("officialLanguages", FieldType::Array)
            .unique_keys(["isoCode"])
            .destination_name("open_holidays_countries"),
    ]
}

use crate::error::{ProxyError, ProxyResult};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

/// One entry of the chart. `rank` is the 1-based position of the row in the
/// document, never a value read from the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRecord {
    pub rank: usize,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub song_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Artist,
    Album,
    SongId,
}

/// Which matches of a selector contribute to the extracted text.
#[derive(Debug, Clone, Copy)]
enum Pick {
    All,
    First,
}

#[derive(Debug, Clone, Copy)]
enum Extract {
    Text(Pick),
    Attr(&'static str),
}

/// One way of reading a field from a row. `selector: None` reads the row element itself.
#[derive(Debug)]
struct Rule {
    selector: Option<&'static str>,
    extract: Extract,
}

const ROW_SELECTOR: &str = "tr[data-song-no]";

// Melon has served the chart under two different row layouts over time.
// Rules are tried in order and the first non-empty value wins.
const FIELD_RULES: [(Field, &[Rule]); 4] = [
    (
        Field::Title,
        &[
            Rule {
                selector: Some("div.ellipsis.rank01 > span > a"),
                extract: Extract::Text(Pick::All),
            },
            Rule {
                selector: Some(".service_list_song .wrap_song_info .rank01 a"),
                extract: Extract::Text(Pick::All),
            },
        ],
    ),
    (
        Field::Artist,
        &[
            Rule {
                selector: Some("div.ellipsis.rank02 > a"),
                extract: Extract::Text(Pick::All),
            },
            Rule {
                selector: Some(".rank02 a"),
                extract: Extract::Text(Pick::First),
            },
        ],
    ),
    (
        Field::Album,
        &[
            Rule {
                selector: Some("div.ellipsis.rank03 > a"),
                extract: Extract::Text(Pick::All),
            },
            Rule {
                selector: Some(".rank03 a"),
                extract: Extract::Text(Pick::First),
            },
        ],
    ),
    (
        Field::SongId,
        &[
            Rule {
                selector: None,
                extract: Extract::Attr("data-song-no"),
            },
            Rule {
                selector: Some("input.input_check"),
                extract: Extract::Attr("value"),
            },
        ],
    ),
];

struct CompiledRule {
    selector: Option<Selector>,
    extract: Extract,
}

struct ChartSelectors {
    row: Selector,
    fields: Vec<(Field, Vec<CompiledRule>)>,
}

// Compiled once. A broken table is reported on each extraction instead of panicking.
static CHART_SELECTORS: Lazy<Result<ChartSelectors, String>> =
    Lazy::new(|| ChartSelectors::compile(ROW_SELECTOR, &FIELD_RULES));

fn compile_selector(selector: &str) -> Result<Selector, String> {
    Selector::parse(selector).map_err(|e| format!("invalid selector '{selector}': {e:?}"))
}

impl ChartSelectors {
    fn compile(row: &str, rules: &[(Field, &[Rule])]) -> Result<Self, String> {
        let row = compile_selector(row)?;
        let fields = rules
            .iter()
            .map(|(field, rules)| -> Result<(Field, Vec<CompiledRule>), String> {
                let compiled = rules
                    .iter()
                    .map(|rule| -> Result<CompiledRule, String> {
                        Ok(CompiledRule {
                            selector: rule.selector.map(compile_selector).transpose()?,
                            extract: rule.extract,
                        })
                    })
                    .collect::<Result<Vec<CompiledRule>, String>>()?;
                Ok((*field, compiled))
            })
            .collect::<Result<Vec<_>, String>>()?;

        Ok(ChartSelectors { row, fields })
    }

    fn extract(&self, document: &Html) -> Vec<ChartRecord> {
        document
            .select(&self.row)
            .enumerate()
            .map(|(i, row)| ChartRecord {
                rank: i + 1,
                // Partial rows are kept with empty fields rather than dropped.
                title: self.field(row, Field::Title).unwrap_or_default(),
                artist: self.field(row, Field::Artist).unwrap_or_default(),
                album: self.field(row, Field::Album).unwrap_or_default(),
                song_id: self.field(row, Field::SongId),
            })
            .collect()
    }

    fn field(&self, row: ElementRef, field: Field) -> Option<String> {
        self.fields
            .iter()
            .filter(|(f, _)| *f == field)
            .flat_map(|(_, rules)| rules.iter())
            .filter_map(|rule| rule.apply(row))
            .find(|value| !value.is_empty())
    }
}

impl CompiledRule {
    fn apply(&self, row: ElementRef) -> Option<String> {
        let value = match (&self.selector, self.extract) {
            (None, Extract::Text(_)) => row.text().collect::<String>(),
            (None, Extract::Attr(name)) => row.value().attr(name)?.to_string(),
            (Some(selector), Extract::Text(Pick::All)) => row
                .select(selector)
                .flat_map(|node| node.text())
                .collect::<String>(),
            (Some(selector), Extract::Text(Pick::First)) => {
                row.select(selector).next()?.text().collect::<String>()
            }
            (Some(selector), Extract::Attr(name)) => {
                row.select(selector).next()?.value().attr(name)?.to_string()
            }
        };
        Some(value.trim().to_string())
    }
}

/// Rejects bodies that are not markup at all, e.g. an empty reply or a JSON
/// error page. Anything starting with a tag goes to the (permissive) parser.
fn ensure_markup(body: &str) -> ProxyResult<()> {
    let body = body.trim_start_matches('\u{feff}').trim_start();
    match body.chars().next() {
        None => Err(ProxyError::ParseFailed("empty document".to_string())),
        Some('<') => Ok(()),
        Some(_) => Err(ProxyError::ParseFailed(
            "response body is not HTML markup".to_string(),
        )),
    }
}

/// Extracts the ranked chart rows from the Melon chart page.
/// A page without any chart row is a valid, empty chart.
pub fn parse_chart(html: &str) -> ProxyResult<Vec<ChartRecord>> {
    ensure_markup(html)?;
    let selectors = CHART_SELECTORS
        .as_ref()
        .map_err(|e| ProxyError::ParseFailed(e.clone()))?;

    let document = Html::parse_document(html);
    Ok(selectors.extract(&document))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows: &str) -> String {
        format!(
            r#"<!DOCTYPE html><html><body>
            <div class="service_list_song"><table><tbody>{rows}</tbody></table></div>
            </body></html>"#
        )
    }

    fn current_layout_row(id: &str, rank: &str, title: &str, artist: &str, album: &str) -> String {
        format!(
            r#"<tr class="lst50" data-song-no="{id}">
                <td><span class="rank">{rank}</span></td>
                <td><div class="wrap_song_info">
                    <div class="ellipsis rank01"><span><a href="/song">{title}</a></span></div>
                    <div class="ellipsis rank02"><a href="/song">{artist}</a></div>
                </div></td>
                <td><div class="wrap_song_info">
                    <div class="ellipsis rank03"><a href="/song">{album}</a></div>
                </div></td>
            </tr>"#
        )
    }

    #[test]
    fn rows_are_ranked_by_document_order() {
        // The rank text inside the rows is deliberately out of order.
        let html = page(&[
            current_layout_row("100", "7", "Supernova", "aespa", "Armageddon"),
            current_layout_row("200", "1", "How Sweet", "NewJeans", "How Sweet"),
            current_layout_row("300", "99", "Magnetic", "ILLIT", "SUPER REAL ME"),
        ]
        .concat());

        let chart = parse_chart(&html).unwrap();

        assert_eq!(chart.len(), 3);
        assert_eq!(
            chart.iter().map(|r| r.rank).collect::<Vec<usize>>(),
            vec![1, 2, 3]
        );
        assert_eq!(
            chart[0],
            ChartRecord {
                rank: 1,
                title: "Supernova".to_string(),
                artist: "aespa".to_string(),
                album: "Armageddon".to_string(),
                song_id: Some("100".to_string()),
            }
        );
        assert_eq!(chart[2].title, "Magnetic");
        assert_eq!(chart[2].song_id.as_deref(), Some("300"));
    }

    #[test]
    fn extracted_text_is_trimmed() {
        let html = page(&current_layout_row(
            "1",
            "1",
            "\n   Spaced Title \t",
            "  Someone  ",
            "\u{a0}Album\u{a0}",
        ));

        let chart = parse_chart(&html).unwrap();

        assert_eq!(chart[0].title, "Spaced Title");
        assert_eq!(chart[0].artist, "Someone");
        assert_eq!(chart[0].album, "Album");
    }

    #[test]
    fn fallback_selectors_are_used_when_primary_misses() {
        // Older layout: no div.ellipsis wrappers, links sit in plain rank0x containers.
        let html = page(
            r#"<tr data-song-no="42">
                <td><div class="wrap_song_info">
                    <span class="rank01"><a href="/song">  Old Layout Song </a></span>
                    <span class="rank02"><a href="/song">First Artist</a><a href="/song">Second Artist</a></span>
                    <span class="rank03"><a href="/song">Old Album</a></span>
                </div></td>
            </tr>"#,
        );

        let chart = parse_chart(&html).unwrap();

        assert_eq!(chart.len(), 1);
        assert_eq!(chart[0].title, "Old Layout Song");
        assert_eq!(chart[0].artist, "First Artist");
        assert_eq!(chart[0].album, "Old Album");
    }

    #[test]
    fn primary_selector_wins_over_fallback() {
        let html = page(
            r#"<tr data-song-no="1"><td><div class="wrap_song_info">
                <div class="ellipsis rank01"><span><a>Primary</a></span></div>
                <span class="rank01"><a>Fallback</a></span>
            </div></td></tr>"#,
        );

        let chart = parse_chart(&html).unwrap();

        // The fallback also matches the primary link, only the primary result is used.
        assert_eq!(chart[0].title, "Primary");
    }

    #[test]
    fn whitespace_only_primary_falls_through() {
        let html = page(
            r#"<tr data-song-no="1"><td><div class="wrap_song_info">
                <div class="ellipsis rank01"><span><a>   </a></span></div>
                <span class="rank01"><em><a>Real Title</a></em></span>
            </div></td></tr>"#,
        );

        let chart = parse_chart(&html).unwrap();

        assert_eq!(chart[0].title, "Real Title");
    }

    #[test]
    fn rows_without_matching_fields_are_kept() {
        let html = page(
            r#"<tr data-song-no="5"><td>nothing useful</td></tr>
               <tr data-song-no="6"><td><div class="ellipsis rank01"><span><a>Only Title</a></span></div></td></tr>"#,
        );

        let chart = parse_chart(&html).unwrap();

        assert_eq!(chart.len(), 2);
        assert_eq!(
            chart[0],
            ChartRecord {
                rank: 1,
                title: String::new(),
                artist: String::new(),
                album: String::new(),
                song_id: Some("5".to_string()),
            }
        );
        assert_eq!(chart[1].rank, 2);
        assert_eq!(chart[1].title, "Only Title");
        assert_eq!(chart[1].artist, "");
    }

    #[test]
    fn empty_song_id_attribute_uses_fallback_or_none() {
        let html = page(
            r#"<tr data-song-no=""><td><input type="checkbox" class="input_check" value="777"></td></tr>
               <tr data-song-no=" "><td></td></tr>"#,
        );

        let chart = parse_chart(&html).unwrap();

        assert_eq!(chart.len(), 2);
        assert_eq!(chart[0].song_id.as_deref(), Some("777"));
        assert_eq!(chart[1].song_id, None);
    }

    #[test]
    fn rows_without_song_number_are_ignored() {
        let html = page(
            r#"<tr class="header"><th>Rank</th></tr>
               <tr data-song-no="1"><td></td></tr>
               <tr class="ad"><td>ad</td></tr>"#,
        );

        let chart = parse_chart(&html).unwrap();

        assert_eq!(chart.len(), 1);
        assert_eq!(chart[0].rank, 1);
    }

    #[test]
    fn page_without_rows_is_an_empty_chart() {
        let chart = parse_chart("<html><body><p>Service maintenance</p></body></html>").unwrap();
        assert!(chart.is_empty());
    }

    #[test]
    fn non_markup_body_fails_to_parse() {
        assert!(matches!(parse_chart(""), Err(ProxyError::ParseFailed(_))));
        assert!(matches!(parse_chart(" \n\t "), Err(ProxyError::ParseFailed(_))));
        assert!(matches!(
            parse_chart(r#"{"error":"blocked"}"#),
            Err(ProxyError::ParseFailed(_))
        ));
    }

    #[test]
    fn leading_bom_and_whitespace_are_accepted() {
        let chart = parse_chart("\u{feff}\n  <html><body></body></html>").unwrap();
        assert!(chart.is_empty());
    }

    #[test]
    fn invalid_selector_table_fails_to_compile() {
        let rules: [(Field, &[Rule]); 1] = [(
            Field::Title,
            &[Rule {
                selector: Some("div[[["),
                extract: Extract::Text(Pick::All),
            }],
        )];
        assert!(ChartSelectors::compile(ROW_SELECTOR, &rules).is_err());
        assert!(ChartSelectors::compile(ROW_SELECTOR, &FIELD_RULES).is_ok());
    }

    #[test]
    fn records_serialize_with_camel_case_song_id() {
        let record = ChartRecord {
            rank: 1,
            title: "t".to_string(),
            artist: "a".to_string(),
            album: "b".to_string(),
            song_id: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "rank": 1, "title": "t", "artist": "a", "album": "b", "songId": null
            })
        );
    }
}

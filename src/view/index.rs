use maud::{Markup, html};

use crate::model::{BY_ID_PREFIX, HistoryWindow, Region};

pub const INDEX_TITLE: &str = "League Time";

#[must_use]
pub fn render_index_template(window: HistoryWindow) -> Markup {
    html! {
        (maud::DOCTYPE)
        head {
            meta charset="UTF-8";
            meta name="viewport" content="width=device-width, initial-scale=1.0";
            title { (INDEX_TITLE) }
        }
        body {
            h1 { (INDEX_TITLE) }
            p {
                @if window.is_unlimited() {
                    "Every match on record."
                } @else {
                    "Matches from the past " (window.days()) " days."
                }
            }
            form id="search" action="matches" method="get" {
                select name="region" {
                    @for region in Region::ALL {
                        option value=(region.code()) { (region.code().to_uppercase()) }
                    }
                }
                input type="text" name="summoner" placeholder="Summoner name" required;
                button type="submit" { "Search" }
            }
            p class="hint" { "Prefix an account id with " code { (BY_ID_PREFIX) } " to skip the name lookup." }
        }
    }
}

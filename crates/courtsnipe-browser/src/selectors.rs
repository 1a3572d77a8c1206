//! The portal's markup vocabulary.
//!
//! Core code names controls by role ([`Locator`], [`Dataset`]); this module is
//! the only place that knows which CSS selector or Kendo widget backs each one.

use courtsnipe_core::{Dataset, Locator};
use serde::{Deserialize, Serialize};

/// CSS selectors of the booking portal. Every field can be overridden from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSelectors {
    pub email: String,
    pub password: String,
    pub login_button: String,
    pub scheduler: String,
    pub date_header: String,
    pub reserve_button: String,
    pub form_title: String,
    pub partner_input: String,
    pub partner_widget: String,
    pub duration_widget: String,
    pub waiver_checkbox: String,
    pub waiver_label: String,
    pub save_button: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            email: r#"input[name="email"]"#.to_string(),
            password: r#"input[name="password"]"#.to_string(),
            login_button: r#"button[data-testid="Continue"]"#.to_string(),
            scheduler: "#CourtsScheduler".to_string(),
            date_header: ".k-lg-date-format".to_string(),
            reserve_button: r#"button[data-testid="reserveBtn"]"#.to_string(),
            form_title: r#"[data-testid="title"]"#.to_string(),
            partner_input: r#"input[name="OwnersDropdown_input"]"#.to_string(),
            partner_widget: "#OwnersDropdown".to_string(),
            duration_widget: "input[name='Duration']".to_string(),
            waiver_checkbox: "#DisclosureAgree".to_string(),
            waiver_label: "label[for='DisclosureAgree']".to_string(),
            save_button: r#"button[data-testid="save-btn"]"#.to_string(),
        }
    }
}

/// A Kendo widget whose data source backs a [`Dataset`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetRef {
    /// Element the widget is attached to.
    pub selector: String,
    /// jQuery data key, e.g. `kendoDropDownList`.
    pub kind: &'static str,
    /// Read the filtered view instead of the full data.
    pub filtered: bool,
    /// Close the popup after selecting.
    pub close_after_select: bool,
}

impl SiteSelectors {
    /// CSS selector for `target`.
    pub fn resolve(&self, target: &Locator) -> String {
        match target {
            Locator::Scheduler => self.scheduler.clone(),
            Locator::DateHeader => self.date_header.clone(),
            Locator::ReserveButton { unit, time_label } => format!(
                r#"{}[data-courtlabel="{}"]:has-text("Reserve {}")"#,
                self.reserve_button,
                css_string(unit.label()),
                css_string(time_label)
            ),
            Locator::ReservationForm => self.form_title.clone(),
            Locator::PartnerSearch => self.partner_input.clone(),
            Locator::WaiverCheckbox => self.waiver_checkbox.clone(),
            Locator::WaiverLabel => self.waiver_label.clone(),
            Locator::SaveButton => self.save_button.clone(),
        }
    }

    pub fn widget(&self, source: Dataset) -> WidgetRef {
        match source {
            Dataset::DurationOptions => WidgetRef {
                selector: self.duration_widget.clone(),
                kind: "kendoDropDownList",
                filtered: false,
                close_after_select: false,
            },
            Dataset::PartnerMatches => WidgetRef {
                selector: self.partner_widget.clone(),
                kind: "kendoComboBox",
                filtered: true,
                close_after_select: true,
            },
        }
    }
}

fn css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use courtsnipe_core::BookableUnit;

    #[test]
    fn reserve_button_combines_court_and_time() {
        let selectors = SiteSelectors::default();
        let button = Locator::ReserveButton {
            unit: BookableUnit::new("Redmond 4"),
            time_label: "6:00 PM".to_string(),
        };

        assert_eq!(
            selectors.resolve(&button),
            r#"button[data-testid="reserveBtn"][data-courtlabel="Redmond 4"]:has-text("Reserve 6:00 PM")"#
        );
    }

    #[test]
    fn court_labels_are_escaped() {
        let selectors = SiteSelectors::default();
        let button = Locator::ReserveButton {
            unit: BookableUnit::new(r#"Court "A""#),
            time_label: "7:30 PM".to_string(),
        };

        assert!(selectors.resolve(&button).contains(r#"[data-courtlabel="Court \"A\""]"#));
    }

    #[test]
    fn partial_overrides_keep_defaults() {
        let selectors: SiteSelectors =
            serde_json::from_str(r##"{"scheduler": "#OtherScheduler"}"##).unwrap();

        assert_eq!(selectors.resolve(&Locator::Scheduler), "#OtherScheduler");
        assert_eq!(
            selectors.resolve(&Locator::SaveButton),
            r#"button[data-testid="save-btn"]"#
        );
    }

    #[test]
    fn partner_widget_reads_the_filtered_view() {
        let widget = SiteSelectors::default().widget(Dataset::PartnerMatches);
        assert_eq!(widget.kind, "kendoComboBox");
        assert!(widget.filtered);
        assert!(widget.close_after_select);
    }
}

//! The QC review questionnaire. Answers are stored by field name:
//! multiple-choice fields by their own name, dates as `<prefix>when<i>`
//! (single) or `<prefix>when<i>s`/`<prefix>when<i>e` (paired), and comments
//! as `<prefix>cmts`.

pub type Choices = &'static [(&'static str, &'static str)];

pub const YES_NO: Choices = &[("y", "Yes"), ("n", "No")];
pub const YES_NO_UNCERTAIN: Choices = &[("y", "Yes"), ("n", "No"), ("u", "Uncertain")];
pub const YES_NO_MAYBE_SITE: Choices = &[("y", "Yes"), ("n", "No"), ("m", "Maybe"), ("s", "Site discretion")];
pub const LSE_STATUS: Choices = &[("s", "Small enough"), ("0", "Uniformly 0"), ("l", "Larger than usual")];

/// Date slots per question.
pub const N_DATE_SLOTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    None,
    Single,
    Paired,
}

#[derive(Debug)]
pub struct MultipleChoice {
    pub field: &'static str,
    pub label: &'static str,
    pub choices: Choices,
}

impl MultipleChoice {
    pub fn label_for(&self, code: &str) -> Option<&'static str> {
        self.choices.iter().find(|(c, _)| *c == code).map(|(_, l)| *l)
    }
}

#[derive(Debug)]
pub struct Question {
    pub prefix: &'static str,
    pub title: &'static str,
    pub message: &'static str,
    pub mcs: &'static [MultipleChoice],
    pub dates: DateKind,
    pub comments_label: &'static str,
}

impl Question {
    pub fn comments_field(&self) -> String {
        format!("{}cmts", self.prefix)
    }

    /// Field names of date slot `i`: `(start, Some(end))` when paired.
    pub fn date_fields(&self, i: usize) -> Option<(String, Option<String>)> {
        match self.dates {
            DateKind::None => None,
            DateKind::Single => Some((format!("{}when{}", self.prefix, i), None)),
            DateKind::Paired => Some((
                format!("{}when{}s", self.prefix, i),
                Some(format!("{}when{}e", self.prefix, i)),
            )),
        }
    }
}

#[derive(Debug)]
pub struct Section {
    pub name: &'static str,
    pub intro: &'static str,
    pub questions: &'static [Question],
}

const fn mc(field: &'static str, label: &'static str, choices: Choices) -> MultipleChoice {
    MultipleChoice { field, label, choices }
}

pub const SECTIONS: &[Section] = &[
    Section {
        name: "Critical quality checks",
        intro: "Data with any of the issues here generally requires reprocessing or release flagging \
                (i.e. spectra to be flagged on tccondata.org and withheld from the public files). If an \
                issue here does not require reprocessing or flagging, please describe why in the comments.",
        questions: &[
            Question {
                prefix: "pres_err_",
                title: "Pressure sensor error",
                message: "Check the zmin - zobs plot (< 1 hPa ideal, < 3 hPa acceptable) if available. \
                          If not, check pout for drift.",
                mcs: &[
                    mc("pres_err_present", "Is pressure error present", YES_NO_UNCERTAIN),
                    mc("pres_err_reproc", "Requires reprocessing", YES_NO_MAYBE_SITE),
                ],
                dates: DateKind::Paired,
                comments_label: "Comments",
            },
            Question {
                prefix: "nans_",
                title: "Window NaNs (Non-Voigt compiler check)",
                message: "Check the bar graph of NaNs per window; if some windows are all NaNs and others \
                          not, this indicates a compiler problem. Common offenders are the CH4 5938 wCO2 windows.",
                mcs: &[
                    mc("nans_present", "Mismatched numbers of NaNs", YES_NO),
                    mc("nans_reproc", "Required reprocessing", YES_NO_MAYBE_SITE),
                ],
                dates: DateKind::None,
                comments_label: "Comments (include which windows are affected)",
            },
            Question {
                prefix: "qc_flags_",
                title: "Automatic QC flags",
                message: "Check the bar graph of flags removing spectra for unusual flags removing significant \
                          numbers of spectra. xhf_error can remove more than it should at wet sites in particular.",
                mcs: &[
                    mc("qc_flags_present", "Unusual flags present", YES_NO_UNCERTAIN),
                    mc("qc_flags_reproc", "Required reprocessing", YES_NO_MAYBE_SITE),
                ],
                dates: DateKind::None,
                comments_label: "Comments (include which flags are unusual)",
            },
            Question {
                prefix: "timing_",
                title: "Timing error",
                message: "Check at least the Xluft PM - AM plot (|∆| < 0.01 ideal) and Xluft vs. SZA plots.",
                mcs: &[
                    mc("timing_present", "Is timing error present", YES_NO_UNCERTAIN),
                    mc("timing_reproc", "Requires reprocessing", YES_NO_MAYBE_SITE),
                ],
                dates: DateKind::Paired,
                comments_label: "Comments",
            },
            Question {
                prefix: "rolling_xluft_",
                title: "Rolling Xluft check",
                message: "Check the 500 spectra rolling Xluft median for time periods significantly outside \
                          the ±0.004 limits",
                mcs: &[
                    mc("rolling_xluft_present", "Out-of-family Xluft present", YES_NO_UNCERTAIN),
                    mc("rolling_xluft_flag", "Required release flagging", YES_NO_UNCERTAIN),
                ],
                dates: DateKind::Paired,
                comments_label: "Comments",
            },
        ],
    },
    Section {
        name: "Informational quality checks",
        intro: "The checks in this section are generally ones that cannot be fixed except in special cases \
                and so do not require reprocessing. If the error is sufficiently large, the data may be flagged out.",
        questions: &[
            Question {
                prefix: "hcl_vsf_",
                title: "HCl VSF",
                message: "Check the HCl VSF plot and verify that the VSF is stable over time. If there are \
                          jumps, check if they are related to changes in the instrument.",
                mcs: &[
                    mc("hcl_vsf_unstable", "HCl VSF is unstable/jumps", YES_NO_UNCERTAIN),
                    mc("hcl_vsf_follow_up", "Requires follow up", YES_NO),
                ],
                dates: DateKind::Single,
                comments_label: "Comments",
            },
            Question {
                prefix: "o2_fs_",
                title: "O2 frequency shift",
                message: "Check the o2_7885_fs time series. If the values are off the y-axis scale or there \
                          are jumps, check with the site to see if these are related to changes in the instrument.",
                mcs: &[
                    mc("o2_fs_unstable", "O2 FS is off scale/jumps", YES_NO_UNCERTAIN),
                    mc("o2_fs_follow_up", "Requires follow up", YES_NO),
                ],
                dates: DateKind::Single,
                comments_label: "Comments",
            },
            Question {
                prefix: "nonlin_",
                title: "Nonlinearity",
                message: "Examine time series plots of DIP and CL, along with the rolling derivative of DIP vs. \
                          CL, and the DIP vs. CL scatter plot. A significant relationship between DIP and CL could \
                          indicate that the detectors run in a nonlinear regime, particularly if DIP<0. (As a \
                          reference point, the Sodankylä DIP vs. CL slope when the signal levels were too high is \
                          around 0.01, and 0 when the light levels were limited.) At this time, we do not \
                          understand what DIP>0 indicates.",
                mcs: &[mc("nonlin_present", "Nonlinearity present", YES_NO_UNCERTAIN)],
                dates: DateKind::Paired,
                comments_label: "Comments",
            },
            Question {
                prefix: "sg_",
                title: "SG stretch",
                message: "Check the rolling median SG stretch plot, considering both the median and individual \
                          spectra data points. Large deviations in the median, or repeating diurnal variations \
                          centered on solar noon in the individual values indicative of diurnal cycles > 1 ppm \
                          should be brought to the PI's attention, especially if they correspond with deviations \
                          in Xluft. (These diurnal variations may be difficult to see in long time series.)",
                mcs: &[mc("sg_present", "SG stretch suggests pointing error", YES_NO_UNCERTAIN)],
                dates: DateKind::Paired,
                comments_label: "Comments",
            },
            Question {
                prefix: "lse_",
                title: "LSE",
                message: "Check the rolling median LSE plot. This should be < 0.0001 or so if the site has two \
                          detectors and an M16 controller. If it is uniformly zero (i.e. the site has only one \
                          detector), confirm that: 1. If the site has an M16 controller, that the XSM setting is \
                          on (which removes ghosts); 2. If the site has an M15 controller, that the team used the \
                          Dohe method to correct ghosts; 3. If the LSE is large, inquire why.",
                mcs: &[
                    mc("lse_present", "LSE status", LSE_STATUS),
                    mc("lse_follow_up", "Requires follow up", YES_NO),
                ],
                dates: DateKind::None,
                comments_label: "Comments",
            },
        ],
    },
    Section {
        name: "Additional comments",
        intro: "Use this section for any additional comments to the site PI. Please reference plot numbers.",
        questions: &[Question {
            prefix: "additional_",
            title: "",
            message: "",
            mcs: &[],
            dates: DateKind::None,
            comments_label: "Additional comments",
        }],
    },
];

/// Multiple-choice fields that need at least one date unless answered `n`,
/// with the prefix of the question holding the dates.
pub const REQUIRED_DATES: &[(&str, &str)] = &[
    ("timing_present", "timing_"),
    ("pres_err_present", "pres_err_"),
    ("rolling_xluft_present", "rolling_xluft_"),
    ("sg_present", "sg_"),
    ("nonlin_present", "nonlin_"),
    ("hcl_vsf_unstable", "hcl_vsf_"),
    ("o2_fs_unstable", "o2_fs_"),
];

pub fn questions() -> impl Iterator<Item = &'static Question> {
    SECTIONS.iter().flat_map(|s| s.questions.iter())
}

pub fn question(prefix: &str) -> Option<&'static Question> {
    questions().find(|q| q.prefix == prefix)
}

pub fn multiple_choice(field: &str) -> Option<&'static MultipleChoice> {
    questions().flat_map(|q| q.mcs.iter()).find(|m| m.field == field)
}

/// Every answer field the questionnaire defines.
pub fn answer_fields() -> Vec<String> {
    let mut fields = Vec::new();
    for q in questions() {
        fields.extend(q.mcs.iter().map(|m| m.field.to_string()));
        for i in 0..N_DATE_SLOTS {
            if let Some((start, end)) = q.date_fields(i) {
                fields.push(start);
                fields.extend(end);
            }
        }
        fields.push(q.comments_field());
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_dates_point_at_dated_questions() {
        for (field, prefix) in REQUIRED_DATES {
            let q = question(prefix).unwrap();
            assert_ne!(q.dates, DateKind::None, "{prefix} has no dates");
            assert!(q.mcs.iter().any(|m| m.field == *field));
        }
    }

    #[test]
    fn field_names_follow_date_kind() {
        let timing = question("timing_").unwrap();
        assert_eq!(
            timing.date_fields(3),
            Some(("timing_when3s".to_string(), Some("timing_when3e".to_string())))
        );
        let hcl = question("hcl_vsf_").unwrap();
        assert_eq!(hcl.date_fields(0), Some(("hcl_vsf_when0".to_string(), None)));
        assert_eq!(question("nans_").unwrap().date_fields(0), None);

        let fields = answer_fields();
        assert!(fields.contains(&"additional_cmts".to_string()));
        assert!(fields.contains(&"o2_fs_when9".to_string()));
        assert!(fields.contains(&"sg_when9e".to_string()));
        assert_eq!(multiple_choice("lse_present").unwrap().label_for("0"), Some("Uniformly 0"));
    }

    #[test]
    fn detector_questions_carry_full_guidance() {
        let nonlin = question("nonlin_").unwrap().message;
        assert!(nonlin.contains("Sodankylä DIP vs. CL slope"));
        assert!(nonlin.ends_with("we do not understand what DIP>0 indicates."));

        let sg = question("sg_").unwrap().message;
        assert!(sg.contains("in the individual values"));
        assert!(sg.ends_with("(These diurnal variations may be difficult to see in long time series.)"));

        let lse = question("lse_").unwrap().message;
        assert!(lse.contains("(i.e. the site has only one detector)"));
        assert!(lse.contains("that the XSM setting is on (which removes ghosts)"));
        assert!(lse.contains("the team used the Dohe method to correct ghosts"));
    }
}

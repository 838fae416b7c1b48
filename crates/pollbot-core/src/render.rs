//! Message bodies for polls. Every function here is pure: the same inputs
//! always produce the same text, so re-rendering after a retried edit is
//! idempotent.

use pollbot_models::{PollRef, Tally};
use pollbot_util::markup::{escape_percent, number_emoji};
use pollbot_util::vote_token::VoteToken;

pub const RESULTS_PLACEHOLDER: &str = "*Results*\n_No votes yet_";

fn option_marker(option: usize) -> String {
    number_emoji(option)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{option}."))
}

/// Prompt plus enumerated options; voters react with the option markers.
pub fn public_prompt(prompt: &str, options: &[String]) -> String {
    let mut body = format!("Poll: *{prompt}*\n\n");
    for (index, option) in options.iter().enumerate() {
        body.push_str(&format!("{}  {}\n", option_marker(index + 1), option));
    }
    body.push_str("Tap a reaction below to register your vote!");
    escape_percent(&body)
}

pub fn anonymous_prompt(prompt: &str) -> String {
    escape_percent(&format!("Anonymous Poll: *{prompt}*"))
}

/// One vote link per option. The chat formatter would otherwise consume the
/// `%` of every URL escape, so the whole body is escaped, labels included.
pub fn anonymous_choices(poll_ref: &PollRef, options: &[String], http_prefix: &str) -> String {
    let mut body = String::new();
    for (index, option) in options.iter().enumerate() {
        let choice = (index + 1) as u32;
        let link = VoteToken::new(poll_ref.clone(), choice).link(http_prefix);
        body.push_str(&format!(
            "\n{}  *{}*\n{}\n",
            option_marker(index + 1),
            option,
            link
        ));
    }
    escape_percent(&body)
}

/// Results message for an anonymous poll, e.g. `Pizza: 1, Salad: 0`.
pub fn results(options: &[String], tally: &Tally) -> String {
    let counts = options
        .iter()
        .enumerate()
        .map(|(index, option)| format!("{}: {}", option, tally.count_for((index + 1) as u32)))
        .collect::<Vec<_>>()
        .join(", ");
    let total = tally.total();
    let noun = if total == 1 { "vote" } else { "votes" };
    escape_percent(&format!("*Results*\n{counts}\n_{total} {noun}_"))
}

pub fn login_message(link: &str) -> String {
    escape_percent(&format!(
        "Thanks for using the polling service!\n\n\
         To log in your web browser in order to vote in anonymous polls, please follow the link below. \
         Once that is completed, you will be able to vote in anonymous polls simply by clicking the \
         links that I provide in the polls.\n\n{link}"
    ))
}

/// Corrective reply to a malformed command. `reason` may quote user input.
pub fn usage_reply(reason: &str, usage: &str) -> String {
    escape_percent(&format!("Sorry, {reason}.\n{usage}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn results_render_counts_in_option_order() {
        let options = labels(&["Pizza", "Salad"]);
        let tally = Tally::from_choices(2, [1]);
        let text = results(&options, &tally);
        assert_eq!(text, "*Results*\nPizza: 1, Salad: 0\n_1 vote_");
        assert_eq!(results(&options, &tally), text);
    }

    #[test]
    fn results_pluralize_totals() {
        let options = labels(&["A", "B", "C"]);
        let tally = Tally::from_choices(3, [3, 3]);
        assert_eq!(results(&options, &tally), "*Results*\nA: 0, B: 0, C: 2\n_2 votes_");
    }

    #[test]
    fn public_prompt_lists_options_with_markers() {
        let text = public_prompt("Beach office?", &labels(&["Yes", "No"]));
        assert!(text.starts_with("Poll: *Beach office?*\n\n"));
        assert!(text.contains("1\u{fe0f}\u{20e3}  Yes\n"));
        assert!(text.contains("2\u{fe0f}\u{20e3}  No\n"));
        assert!(text.ends_with("Tap a reaction below to register your vote!"));
    }

    #[test]
    fn anonymous_choices_carry_escaped_vote_links() {
        let poll_ref = PollRef::new("conv-1", 5);
        let text = anonymous_choices(&poll_ref, &labels(&["Pizza", "Salad"]), "https://p.example");
        for choice in 1..=2 {
            let link = VoteToken::new(poll_ref.clone(), choice).link("https://p.example");
            assert!(text.contains(&escape_percent(&link)));
        }
        assert!(!text.replace("%%", "").contains('%'));
    }

    fn has_stray_percent(text: &str) -> bool {
        text.replace("%%", "").contains('%')
    }

    #[test]
    fn user_text_percent_signs_are_escaped_everywhere() {
        let poll_ref = PollRef::new("conv-1", 5);
        let options = labels(&["50% off", "100%"]);
        let tally = Tally::from_choices(2, [1]);
        let bodies = [
            public_prompt("Discount 20%?", &options),
            anonymous_prompt("Discount 20%?"),
            anonymous_choices(&poll_ref, &options, "https://p.example"),
            results(&options, &tally),
            usage_reply("unknown flag `--100%`", "Usage"),
            login_message("https://p.example/pollbot/login?token=a%2Bb&username=al%20ice"),
        ];
        for body in &bodies {
            assert!(!has_stray_percent(body), "{body}");
        }
        assert_eq!(bodies[1], "Anonymous Poll: *Discount 20%%?*");
        assert_eq!(bodies[3], "*Results*\n50%% off: 1, 100%%: 0\n_1 vote_");
    }

    #[test]
    fn options_past_ten_fall_back_to_numbers() {
        assert_eq!(option_marker(11), "11.");
    }
}

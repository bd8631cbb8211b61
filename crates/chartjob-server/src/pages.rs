//! Inline HTML documents served by the page routes.
//!
//! The job page carries its job id in a `data-jobid` attribute and polls
//! `/progress` with the schedule described by [`PollPolicy`]. The script and
//! `chartjob_core::polling::PollTracker` implement the same state machine.

use chartjob_core::domain::JobId;
use chartjob_core::polling::PollPolicy;
use html_escape::{encode_double_quoted_attribute, encode_text};

const LANDING: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>chartjob</title></head>
<body>
<a href="image_page">Render a chart</a>
</body>
</html>
"#;

const JOB_PAGE: &str = r#"<!doctype html>
<html>
<head><meta charset="utf-8"><title>{{TITLE}}</title></head>
<body>
<h1>{{TITLE}}</h1>
<div id="job" data-jobid="{{JOB_ID}}"></div>
<div id="imgpl">Rendering chart, please wait.</div>
<script>
(function () {
  var BASE_DELAY_MS = {{BASE_DELAY_MS}};
  var MULTIPLIER = {{MULTIPLIER}};
  var MAX_DELAY_MS = {{MAX_DELAY_MS}};
  var MAX_ATTEMPTS = {{MAX_ATTEMPTS}};

  var jobid = document.getElementById("job").dataset.jobid;
  var placeholder = document.getElementById("imgpl");
  var attempt = 0;

  function nextDelay(n) {
    var delay = BASE_DELAY_MS * Math.pow(MULTIPLIER, n - 1);
    return Math.min(delay, MAX_DELAY_MS);
  }

  function reschedule() {
    attempt += 1;
    if (attempt >= MAX_ATTEMPTS) {
      placeholder.textContent = "Gave up waiting for the chart.";
      return;
    }
    setTimeout(poll, nextDelay(attempt));
  }

  function poll() {
    fetch("progress?jobid=" + encodeURIComponent(jobid))
      .then(function (resp) { return resp.json(); })
      .then(function (report) {
        if (report.progress === 1) {
          var img = document.createElement("img");
          img.src = "result.png?jobid=" + encodeURIComponent(jobid);
          img.alt = "chart";
          placeholder.replaceChildren(img);
          return;
        }
        if (report.state === "FAILURE") {
          placeholder.textContent = "Chart failed: " + (report.error || "job failed");
          return;
        }
        reschedule();
      })
      .catch(reschedule);
  }

  poll();
})();
</script>
</body>
</html>
"#;

pub fn landing_page() -> String {
    LANDING.to_string()
}

/// Job page for `job_id`, polling with `policy`.
pub fn job_page(job_id: &JobId, policy: &PollPolicy) -> String {
    let id = job_id.to_string();
    let title = format!("Chart job {id}");

    JOB_PAGE
        .replace("{{TITLE}}", &encode_text(&title))
        .replace("{{JOB_ID}}", &encode_double_quoted_attribute(&id))
        .replace("{{BASE_DELAY_MS}}", &policy.base_delay_ms().to_string())
        .replace("{{MULTIPLIER}}", &js_number(policy.backoff.multiplier))
        .replace("{{MAX_DELAY_MS}}", &policy.max_delay_ms().to_string())
        .replace("{{MAX_ATTEMPTS}}", &policy.max_attempts.to_string())
}

// JS has no literal for NaN or infinity.
fn js_number(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        "1".to_string()
    }
}

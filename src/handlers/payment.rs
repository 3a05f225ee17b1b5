//! Payment return pages
//! 決済プロバイダからのリダイレクト先

use axum::{extract::Query, response::Html};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SuccessQuery {
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelQuery {
    pub car_id: Option<String>,
}

/// GET /payment/success?session_id=...
pub async fn payment_success(Query(query): Query<SuccessQuery>) -> Html<String> {
    let session_id = query.session_id.unwrap_or_default();
    info!("Payment success redirect: session_id={}", session_id);

    let detail = if session_id.is_empty() {
        String::new()
    } else {
        format!("<p class=\"ref\">Reference: {}</p>", escape_html(&session_id))
    };
    page(
        "Payment Successful",
        &format!(
            "<h1 class=\"ok\">Payment Successful!</h1>\
             <p>Thank you for your purchase. The seller will contact you shortly.</p>{}\
             <a class=\"btn\" href=\"/listings\">Browse More Cars</a>",
            detail
        ),
    )
}

/// GET /payment/cancel?car_id=...
pub async fn payment_cancel(Query(query): Query<CancelQuery>) -> Html<String> {
    let car_id = query.car_id.unwrap_or_default();
    info!("Payment cancelled: car_id={}", car_id);

    let back = if car_id.is_empty() {
        "<a class=\"btn\" href=\"/listings\">Back to Listings</a>".to_string()
    } else {
        format!(
            "<a class=\"btn\" href=\"/listings/{}\">Return to Car Details</a>",
            escape_html(&car_id)
        )
    };
    page(
        "Payment Cancelled",
        &format!(
            "<h1 class=\"warn\">Payment Cancelled</h1>\
             <p>Your payment was not completed. You have not been charged.</p>{}",
            back
        ),
    )
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width,initial-scale=1">
<title>{title}</title>
<style>
body{{font-family:-apple-system,sans-serif;display:flex;flex-direction:column;
  align-items:center;justify-content:center;min-height:100vh;margin:0;padding:24px;text-align:center}}
.ok{{color:#2e7d32}}
.warn{{color:#ef6c00}}
.ref{{color:#777;font-size:14px}}
.btn{{display:inline-block;margin-top:16px;padding:12px 24px;border-radius:8px;
  background:#1565c0;color:#fff;text-decoration:none}}
</style>
</head>
<body>
{body}
</body>
</html>"#
    ))
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_neutralizes_markup() {
        assert_eq!(
            escape_html("<script>alert('x')</script>&\""),
            "&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;&amp;&quot;"
        );
    }

    #[tokio::test]
    async fn success_page_shows_escaped_reference() {
        let Html(body) = payment_success(Query(SuccessQuery {
            session_id: Some("cs_<b>".into()),
        }))
        .await;
        assert!(body.contains("Reference: cs_&lt;b&gt;"));
        assert!(!body.contains("cs_<b>"));
    }

    #[tokio::test]
    async fn cancel_page_links_back_to_car() {
        let Html(body) = payment_cancel(Query(CancelQuery {
            car_id: Some("42".into()),
        }))
        .await;
        assert!(body.contains("href=\"/listings/42\""));
    }
}

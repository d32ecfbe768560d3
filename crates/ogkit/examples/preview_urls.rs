//! Example: Preview a few URLs and print what was found
//!
//! Run with: cargo run -p ogkit --example preview_urls

use ogkit::{fetch_open_graph, OpenGraphResult};

/// Sample case definition
struct Case {
    url: &'static str,
    description: &'static str,
    expect_title: bool,
}

const CASES: &[Case] = &[
    Case {
        url: "https://example.com",
        description: "Plain HTML page with only a <title>",
        expect_title: true,
    },
    Case {
        url: "https://github.com/rust-lang/rust",
        description: "Page with full Open Graph tags",
        expect_title: true,
    },
    Case {
        url: "https://httpbin.org/status/404",
        description: "Missing page (bad-status)",
        expect_title: false,
    },
    Case {
        url: "https://httpbin.org/redirect/8",
        description: "Redirect chain longer than the cap",
        expect_title: false,
    },
];

#[tokio::main]
async fn main() {
    println!("ogkit preview examples");
    println!("======================\n");

    let mut passed = 0;
    let mut failed = 0;

    for (i, case) in CASES.iter().enumerate() {
        println!("{}. {}", i + 1, case.description);
        println!("   URL: {}", case.url);

        let result = fetch_open_graph(case.url).await;
        print_summary(&result);

        if result.title.is_some() == case.expect_title {
            println!("   PASS\n");
            passed += 1;
        } else {
            println!("   FAIL (expected title: {})\n", case.expect_title);
            failed += 1;
        }
    }

    println!("======================");
    println!("Results: {} passed, {} failed", passed, failed);

    if failed > 0 {
        std::process::exit(1);
    }
}

fn print_summary(result: &OpenGraphResult) {
    println!("   Final URL: {}", result.url);

    if let Some(ref title) = result.title {
        println!("   Title: {}", title);
    }
    if let Some(ref description) = result.description {
        let preview = description.chars().take(100).collect::<String>();
        println!(
            "   Description: {}{}",
            preview,
            if description.chars().count() > 100 { "..." } else { "" }
        );
    }
    if let Some(ref image_url) = result.image_url {
        println!("   Image: {}", image_url);
    }
    if let Some(ref site_name) = result.site_name {
        println!("   Site: {}", site_name);
    }
    if let Some(code) = result.error {
        println!("   Error: {}", code);
    }
}

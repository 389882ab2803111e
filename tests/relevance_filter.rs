// tests/relevance_filter.rs
// Hand-picked pages for the relevance filter: what survives, in what order, under which budget.

use aum_scraper::relevance::{filter, filter_default, is_relevant};

const GESTORA_PAGE: &str = r#"
<html>
  <head><title>Gestora Alfa</title><style>.x { color: red }</style></head>
  <body>
    <header>Menu principal com muitos links</header>
    <nav>Home | Sobre | Contato | Carreiras</nav>
    <p>Somos uma empresa criada em 1998 em São Paulo.</p>
    <p>Hoje administramos R$ 12,4 bilhões em patrimônio sob gestão.</p>
    <p>Nossa equipe tem mais de 80 profissionais.</p>
    <div>Os fundos multimercado são nosso carro-chefe.</div>
    <script>var aum = "R$ 999 bi";</script>
    <footer>Todos os direitos reservados, AUM policy</footer>
  </body>
</html>
"#;

#[test]
fn keeps_relevant_lines_in_document_order() {
    let out = filter_default(GESTORA_PAGE);
    let parts: Vec<&str> = out.split("\n\n").collect();
    assert_eq!(
        parts,
        vec![
            "Hoje administramos R$ 12,4 bilhões em patrimônio sob gestão.",
            "Os fundos multimercado são nosso carro-chefe.",
        ]
    );
}

#[test]
fn script_header_nav_footer_never_leak() {
    let out = filter_default(GESTORA_PAGE);
    assert!(!out.contains("999"));
    assert!(!out.contains("Menu principal"));
    assert!(!out.contains("Carreiras"));
    assert!(!out.contains("direitos reservados"));
}

#[test]
fn output_never_exceeds_budget_in_chars() {
    let paragraph = "<p>Patrimônio sob gestão consolidado é de R$ 3 bi.</p>";
    let html = paragraph.repeat(200);
    let out = filter(&html, 300);
    let text_chars: usize = out.split("\n\n").map(|p| p.chars().count()).sum();
    assert!(text_chars <= 300, "got {text_chars}");
    assert!(!out.is_empty());
}

#[test]
fn relevance_by_keyword_or_amount() {
    assert!(is_relevant("Assets under management grew"));
    assert!(is_relevant("Gerimos US$ 500 mi para clientes"));
    assert!(is_relevant("Nosso PORTFÓLIO é diversificado"));
    assert!(!is_relevant("Fale conosco pelo telefone"));
}

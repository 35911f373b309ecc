//! Regex tables, tag sets, and heuristic flags shared across the pipeline.

use bitflags::bitflags;
use once_cell::sync::Lazy;
use regex::Regex;

bitflags! {
    /// Heuristic toggles relaxed one at a time by the retry controller.
    ///
    /// Flags are only ever cleared during a run, never re-set; a run ends
    /// when the length threshold is met or all flags are gone.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u8 {
        const STRIP_UNLIKELYS = 0x1;
        const WEIGHT_CLASSES = 0x2;
        const CLEAN_CONDITIONALLY = 0x4;
    }
}

/// Compiled regular expressions used by the heuristics.
pub struct Regexps {
    /// A node is "unlikely" only when its class+id string matches all
    /// three of these.
    pub unlikely_candidates: [Regex; 3],
    /// Exception pattern that rescues an otherwise unlikely node.
    pub maybe_candidate: Regex,
    pub positive: Regex,
    pub negative: Regex,
    pub byline: Regex,
    pub videos: Regex,
    pub share_elements: Regex,
    pub normalize: Regex,
    pub hash_url: Regex,
    pub srcset_url: Regex,
    pub b64_data_url: Regex,
    pub json_ld_article_types: Regex,
    pub tokenize: Regex,
    pub has_content: Regex,
    pub display_none: Regex,
    pub image_ext: Regex,
    pub image_ext_srcset: Regex,
    pub image_ext_src: Regex,
    pub sentence_end: Regex,
    pub schema_org: Regex,
    pub title_separators: Regex,
    pub title_before_separator: Regex,
    pub title_after_separator: Regex,
}

pub static REGEXPS: Lazy<Regexps> = Lazy::new(|| Regexps {
    unlikely_candidates: [
        Regex::new(r"(?i)ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|footer|gdpr|header|legends").unwrap(),
        Regex::new(r"(?i)menu|related|remark|replies|rss|shoutbox|sidebar|skyscraper|social|sponsor|supplemental").unwrap(),
        Regex::new(r"(?i)agegate|pagination|pager|popup|yom-remote|ad-break").unwrap(),
    ],
    maybe_candidate: Regex::new(r"(?i)and|article|body|column|content|main|shadow").unwrap(),
    positive: Regex::new(r"(?i)article|body|content|entry|hentry|h-entry|main|page|pagination|post|text|blog|story").unwrap(),
    negative: Regex::new(r"(?i)-ad-|hidden|^hid$| hid$| hid |^hid |banner|combx|comment|com-|contact|foot|footer|footnote|gdpr|masthead|media|meta|outbrain|promo|related|scroll|share|shoutbox|sidebar|skyscraper|sponsor|shopping|tags|tool|widget").unwrap(),
    byline: Regex::new(r"(?i)byline|author|dateline|writtenby|p-author").unwrap(),
    videos: Regex::new(r"(?i)//(www\.)?((dailymotion|youtube|youtube-nocookie|player\.vimeo|v\.qq)\.com|(archive|upload\.wikimedia)\.org|player\.twitch\.tv)").unwrap(),
    share_elements: Regex::new(r"(?i)(\b|_)(share|sharedaddy)(\b|_)").unwrap(),
    normalize: Regex::new(r"\s{2,}").unwrap(),
    hash_url: Regex::new(r"^#.+").unwrap(),
    srcset_url: Regex::new(r"(\S+)(\s+[\d.]+[xw])?(\s*(?:,|$))").unwrap(),
    b64_data_url: Regex::new(r"(?i)^data:\s*([^\s;,]+)\s*;\s*base64\s*,").unwrap(),
    json_ld_article_types: Regex::new(r"^(Article|AdvertiserContentArticle|NewsArticle|AnalysisNewsArticle|AskPublicNewsArticle|BackgroundNewsArticle|OpinionNewsArticle|ReportageNewsArticle|ReviewNewsArticle|Report|SatiricalArticle|ScholarlyArticle|MedicalScholarlyArticle|SocialMediaPosting|BlogPosting|LiveBlogPosting|DiscussionForumPosting|TechArticle|APIReference)$").unwrap(),
    tokenize: Regex::new(r"\W+").unwrap(),
    has_content: Regex::new(r"\S$").unwrap(),
    display_none: Regex::new(r"(?i)display\s*:\s*none").unwrap(),
    image_ext: Regex::new(r"(?i)\.(jpg|jpeg|png|webp)").unwrap(),
    image_ext_srcset: Regex::new(r"(?i)\.(jpg|jpeg|png|webp)\s+\d").unwrap(),
    image_ext_src: Regex::new(r"(?i)^\s*\S+\.(jpg|jpeg|png|webp)\S*\s*$").unwrap(),
    sentence_end: Regex::new(r"\.( |$)").unwrap(),
    schema_org: Regex::new(r"^https?://schema\.org/?$").unwrap(),
    title_separators: Regex::new(r" [\|/>»] ").unwrap(),
    title_before_separator: Regex::new(r"(.*)[\|/>»] .*").unwrap(),
    title_after_separator: Regex::new(r"[^\|/>»]*[\|/>»](.*)").unwrap(),
});

/// Tags whose text feeds the scoring pass.
pub const SCORABLE_TAGS: [&str; 9] = [
    "section", "h2", "h3", "h4", "h5", "h6", "p", "td", "pre",
];

/// ARIA roles that mark a subtree as chrome rather than content.
pub const UNLIKELY_ROLES: [&str; 7] = [
    "menu",
    "menubar",
    "complementary",
    "navigation",
    "alert",
    "alertdialog",
    "dialog",
];

/// Block-level tags; a div containing any of these keeps its div-ness.
pub const BLOCK_CHILD_TAGS: [&str; 9] = [
    "blockquote", "dl", "div", "img", "ol", "p", "pre", "table", "ul",
];

/// Sibling tags admitted into the article container without retagging.
pub const KEEP_SIBLING_TAGS: [&str; 4] = ["div", "article", "section", "p"];

/// Phrasing-content tags per the HTML spec, as used when merging inline
/// runs into synthetic paragraphs.
pub const PHRASING_TAGS: [&str; 39] = [
    "abbr", "audio", "b", "bdo", "br", "button", "cite", "code", "data",
    "datalist", "dfn", "em", "embed", "i", "img", "input", "kbd", "label",
    "mark", "math", "meter", "noscript", "object", "output", "progress", "q",
    "ruby", "samp", "script", "select", "small", "span", "strong", "sub",
    "sup", "textarea", "time", "var", "wbr",
];

/// Attributes stripped by the cleaner's style pass.
pub const PRESENTATIONAL_ATTRIBUTES: [&str; 12] = [
    "align",
    "background",
    "bgcolor",
    "border",
    "cellpadding",
    "cellspacing",
    "frame",
    "hspace",
    "rules",
    "style",
    "valign",
    "vspace",
];

/// Tags that also lose their width/height attributes.
pub const DEPRECATED_SIZE_ATTRIBUTE_ELEMS: [&str; 5] = ["table", "th", "td", "hr", "pre"];

/// Descendants whose presence marks a table as holding data.
pub const DATA_TABLE_DESCENDANTS: [&str; 5] = ["col", "colgroup", "tfoot", "thead", "th"];

//! LLM prompts for semantic tree generation.

/// Collection of prompts used for tree generation.
pub struct Prompts;

impl Prompts {
    /// System instruction fixing the tree schema and labelling rules.
    pub fn semantic_tree_system() -> &'static str {
        r#"You are an academic paper structuring assistant. Your task is to semantically fragment a paper's body into a tree:
1. Break the long text into a logical tree: first by major sections, then by subsections or fact points.
2. Give each node a precise label (in English) so readers know at a glance what it covers.
3. Each node must be locatable in the source: include position with at least "page" (1-based). Optionally add "quote" for a short excerpt from that page.
4. Output only one JSON object, the root of the tree. Root id is "root", label is the paper title, position can be null. Root's children are top-level sections; each section can have children for subsections or fact points.
5. Every node has the keys "id", "label", "content", "position" and "children". Ids must be unique within the tree.
6. Leaf nodes (no children or empty children) must have position.page.
7. Output all labels and content in English. Do not output any explanation, only the JSON object."#
    }

    /// Worked example of the expected output shape.
    pub fn semantic_tree_example() -> &'static str {
        r#"{
  "id": "root",
  "label": "Paper Title",
  "content": null,
  "position": null,
  "children": [
    {
      "id": "sec1",
      "label": "Introduction",
      "content": "Brief summary or key sentence",
      "position": { "page": 1 },
      "children": [
        {
          "id": "sec1-1",
          "label": "Background",
          "content": "...",
          "position": { "page": 1, "quote": "optional excerpt" },
          "children": []
        }
      ]
    }
  ]
}"#
    }

    /// User message embedding the title and the page-tagged body.
    pub fn semantic_tree_user(title: &str, paged_text: &str) -> String {
        format!(
            "Paper title: {title}\n\n\
             Below is the body with page markers (--- Page N --- means page N):\n\n\
             {paged_text}\n\n\
             Output the root node of the semantic tree as JSON. All labels and content must be in English. Example format:\n\
             {example}\n",
            title = title,
            paged_text = paged_text,
            example = Self::semantic_tree_example(),
        )
    }
}
